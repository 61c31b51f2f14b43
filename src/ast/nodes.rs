//! AST node definitions for btrc.
//!
//! Generated from `spec/ast.asdl` by `asdl-gen`. DO NOT EDIT BY HAND;
//! regenerate with:
//!
//! ```text
//! cargo run --bin asdl-gen -- spec/ast.asdl > src/ast/nodes.rs
//! ```
//!
//! Sum types map to enums, product types to structs. Sequence fields (`*`)
//! become `Vec`, optional fields (`?`) become `Option`, and node-typed
//! fields are boxed. Types with `attributes(...)` are wrapped in a struct
//! carrying the attribute fields alongside the kind enum.

use crate::ast::{NodeId, Span};

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub decls: Vec<Decl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decl {
    pub kind: DeclKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclKind {
    Function { func: Box<FunctionDecl> },
    Class { class: Box<ClassDecl> },
    Interface { iface: Box<InterfaceDecl> },
    Enum { enumeration: Box<EnumDecl> },
    Typedef { name: String, target: Box<TypeExpr> },
    Extern { ret: Box<TypeExpr>, name: String, params: Vec<Param> },
    Struct { name: String, fields: Vec<Param> },
    Global { ty: Option<Box<TypeExpr>>, name: String, init: Option<Box<Expr>> },
    Include { path: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub generic_params: Vec<String>,
    pub ret: Option<Box<TypeExpr>>,
    pub params: Vec<Param>,
    pub body: Option<Box<Block>>,
    pub keep_return: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub generic_params: Vec<String>,
    pub parent: Option<String>,
    pub interfaces: Vec<String>,
    pub is_abstract: bool,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Field { field: Box<FieldDecl> },
    Method { method: Box<MethodDecl> },
    Ctor { ctor: Box<MethodDecl> },
    Dtor { dtor: Box<MethodDecl> },
    Property { prop: Box<PropertyDecl> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: Box<TypeExpr>,
    pub access: Access,
    pub init: Option<Box<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Option<Box<TypeExpr>>,
    pub body: Option<Box<Block>>,
    pub access: Access,
    pub is_static: bool,
    pub is_override: bool,
    pub is_abstract: bool,
    pub keep_return: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub name: String,
    pub ty: Box<TypeExpr>,
    pub access: Access,
    pub getter: Option<Box<Block>>,
    pub setter: Option<Box<Block>>,
    pub setter_param: String,
    pub auto: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Private,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDecl {
    pub name: String,
    pub generic_params: Vec<String>,
    pub methods: Vec<MethodSig>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodSig {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Option<Box<TypeExpr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub variants: Vec<EnumVariant>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumVariant {
    pub name: String,
    pub value: Option<Box<Expr>>,
    pub fields: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Box<TypeExpr>,
    pub default: Option<Box<Expr>>,
    pub keep: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    VarDecl {
        ty: Option<Box<TypeExpr>>,
        name: String,
        init: Option<Box<Expr>>,
        infer: bool,
    },
    TupleDestructure {
        names: Vec<String>,
        value: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        op: String,
        value: Box<Expr>,
    },
    ExprStmt {
        value: Box<Expr>,
    },
    If {
        cond: Box<Expr>,
        then_block: Box<Block>,
        else_block: Option<Box<Block>>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Box<Expr>>,
        update: Option<Box<Expr>>,
        body: Box<Block>,
    },
    ForIn {
        binding: String,
        binding2: Option<String>,
        iterable: Box<Expr>,
        body: Box<Block>,
    },
    While {
        cond: Box<Expr>,
        body: Box<Block>,
    },
    DoWhile {
        body: Box<Block>,
        cond: Box<Expr>,
    },
    Switch {
        value: Box<Expr>,
        cases: Vec<SwitchCase>,
    },
    Try {
        try_block: Box<Block>,
        handler: Option<Box<CatchClause>>,
        finally_block: Option<Box<Block>>,
    },
    Throw {
        value: Box<Expr>,
    },
    Return {
        value: Option<Box<Expr>>,
    },
    Break,
    Continue,
    Block {
        inner: Box<Block>,
    },
    Delete {
        value: Box<Expr>,
    },
    Keep {
        value: Box<Expr>,
    },
    Release {
        value: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub value: Option<Box<Expr>>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub ty: Box<TypeExpr>,
    pub name: String,
    pub body: Box<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub id: NodeId,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    IntLit { text: String },
    FloatLit { text: String },
    CharLit { text: String },
    StringLit { text: String },
    BoolLit { value: bool },
    NullLit,
    SelfLit,
    SuperLit,
    Ident { name: String },
    FString { parts: Vec<FStringPart> },
    Member { base: Box<Expr>, field: String, op: MemberOp },
    Index { base: Box<Expr>, index: Box<Expr> },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Unary { op: String, operand: Box<Expr>, prefix: bool },
    Binary { op: String, left: Box<Expr>, right: Box<Expr> },
    Ternary { cond: Box<Expr>, then_expr: Box<Expr>, else_expr: Box<Expr> },
    Coalesce { left: Box<Expr>, right: Box<Expr> },
    Cast { ty: Box<TypeExpr>, value: Box<Expr> },
    Sizeof { ty: Box<TypeExpr> },
    New { ty: Box<TypeExpr>, args: Vec<Expr> },
    Lambda { params: Vec<Param>, ret: Option<Box<TypeExpr>>, body: Box<LambdaBody> },
    TupleLit { items: Vec<Expr> },
    ListLit { items: Vec<Expr> },
    MapLit { entries: Vec<MapEntry> },
    Range { start: Box<Expr>, end: Option<Box<Expr>>, step: Option<Box<Expr>> },
    Spawn { value: Box<Expr> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FStringPart {
    Text { text: String },
    Chunk { value: Box<Expr>, format: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberOp {
    Dot,
    Arrow,
    Question,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LambdaBody {
    ExprBody { value: Box<Expr> },
    BlockBody { body: Box<Block> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub key: Box<Expr>,
    pub value: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExprKind {
    Named { name: String, args: Vec<TypeExpr> },
    Ptr { inner: Box<TypeExpr> },
    Nullable { inner: Box<TypeExpr> },
    Fn { params: Vec<TypeExpr>, ret: Box<TypeExpr> },
    Tuple { items: Vec<TypeExpr> },
}
