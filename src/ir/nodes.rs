//! IR node definitions.
//!
//! A strictly structured tree between the analyzed AST and C text emission:
//! C is structured, so a tree IR produces readable output. All lowering
//! (class layout, generics, method-to-function, new/delete, for-in,
//! f-strings, lambda lifting, ARC) happens while *building* this tree; the
//! emitter is a plain walk. The only embedded C text is `RawC`, reserved
//! for the setjmp/longjmp scaffolding, and the C type names at the leaves.

use std::collections::BTreeSet;

/// Root of the IR tree: one translation unit.
#[derive(Debug, Clone, Default)]
pub struct IrModule {
    pub includes: Vec<String>,
    pub type_decls: Vec<IrTypeDecl>,
    pub structs: Vec<IrStruct>,
    pub globals: Vec<IrGlobal>,
    pub protos: Vec<IrProto>,
    pub functions: Vec<IrFunction>,
    /// Instantiated generic-collection bodies (registry templates with the
    /// concrete types substituted), emitted between the type definitions
    /// and the function definitions.
    pub generated: Vec<String>,
    /// Helper categories referenced by the generator; pruned to the live
    /// transitive closure by the optimizer, then emitted verbatim.
    pub helper_categories: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub enum IrTypeDecl {
    /// `typedef struct Name Name;`
    StructFwd(String),
    /// `typedef <c_type> Name;`
    Typedef { name: String, c_type: String },
    /// `typedef <ret> (*Name)(<params>);`
    FnPtr {
        name: String,
        ret: String,
        params: Vec<String>,
    },
    /// `typedef enum { A = 0, ... } Name;`
    EnumDef {
        name: String,
        variants: Vec<(String, Option<String>)>,
    },
}

#[derive(Debug, Clone)]
pub struct IrField {
    pub c_type: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct IrStruct {
    pub name: String,
    pub fields: Vec<IrField>,
}

#[derive(Debug, Clone)]
pub struct IrGlobal {
    pub c_type: String,
    pub name: String,
    pub init: Option<IrExpr>,
    pub is_static: bool,
    pub is_const: bool,
}

#[derive(Debug, Clone)]
pub struct IrParam {
    pub c_type: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct IrProto {
    pub ret: String,
    pub name: String,
    pub params: Vec<IrParam>,
    pub is_static: bool,
}

#[derive(Debug, Clone)]
pub struct IrFunction {
    pub proto: IrProto,
    pub body: IrBlock,
}

#[derive(Debug, Clone, Default)]
pub struct IrBlock {
    pub stmts: Vec<IrStmt>,
}

impl IrBlock {
    pub fn new(stmts: Vec<IrStmt>) -> Self {
        IrBlock { stmts }
    }
}

#[derive(Debug, Clone)]
pub enum IrStmt {
    VarDecl {
        c_type: String,
        name: String,
        init: Option<IrExpr>,
    },
    Assign {
        target: IrExpr,
        op: String,
        value: IrExpr,
    },
    ExprStmt(IrExpr),
    If {
        cond: IrExpr,
        then_block: IrBlock,
        else_block: Option<IrBlock>,
    },
    While {
        cond: IrExpr,
        body: IrBlock,
    },
    For {
        init: Option<Box<IrStmt>>,
        cond: Option<IrExpr>,
        update: Option<IrExpr>,
        body: IrBlock,
    },
    Switch {
        value: IrExpr,
        cases: Vec<IrCase>,
    },
    Return(Option<IrExpr>),
    Break,
    Continue,
    Block(IrBlock),
    /// Escape hatch, used solely for setjmp/longjmp boilerplate.
    RawC {
        text: String,
        helper_refs: Vec<String>,
    },
}

#[derive(Debug, Clone)]
pub struct IrCase {
    /// `None` is the default case.
    pub value: Option<IrExpr>,
    pub body: Vec<IrStmt>,
}

#[derive(Debug, Clone)]
pub enum IrExpr {
    /// C literal text (`42`, `"hi"`, `NULL`).
    Literal(String),
    /// Variable reference by C name.
    Var(String),
    BinOp {
        op: String,
        left: Box<IrExpr>,
        right: Box<IrExpr>,
    },
    UnaryOp {
        op: String,
        operand: Box<IrExpr>,
        prefix: bool,
    },
    Call {
        callee: Box<IrExpr>,
        args: Vec<IrExpr>,
        /// Helper category this call depends on, for dead-helper DCE.
        helper_ref: Option<String>,
    },
    Member {
        base: Box<IrExpr>,
        field: String,
        arrow: bool,
    },
    Index {
        base: Box<IrExpr>,
        index: Box<IrExpr>,
    },
    Cast {
        c_type: String,
        value: Box<IrExpr>,
    },
    Sizeof(String),
    /// C compound literal `(Type){ .a = ..., ... }`; item designators are
    /// optional.
    Compound {
        c_type: String,
        items: Vec<(Option<String>, IrExpr)>,
    },
}

// ============================================================================
// Construction shorthands
// ============================================================================

impl IrExpr {
    pub fn lit(text: impl Into<String>) -> IrExpr {
        IrExpr::Literal(text.into())
    }

    pub fn var(name: impl Into<String>) -> IrExpr {
        IrExpr::Var(name.into())
    }

    pub fn null() -> IrExpr {
        IrExpr::Literal("NULL".to_string())
    }

    pub fn call(name: impl Into<String>, args: Vec<IrExpr>) -> IrExpr {
        IrExpr::Call {
            callee: Box::new(IrExpr::Var(name.into())),
            args,
            helper_ref: None,
        }
    }

    pub fn call_helper(name: impl Into<String>, args: Vec<IrExpr>, category: &str) -> IrExpr {
        IrExpr::Call {
            callee: Box::new(IrExpr::Var(name.into())),
            args,
            helper_ref: Some(category.to_string()),
        }
    }

    pub fn binop(left: IrExpr, op: &str, right: IrExpr) -> IrExpr {
        IrExpr::BinOp {
            op: op.to_string(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: &str, operand: IrExpr) -> IrExpr {
        IrExpr::UnaryOp {
            op: op.to_string(),
            operand: Box::new(operand),
            prefix: true,
        }
    }

    pub fn postfix(op: &str, operand: IrExpr) -> IrExpr {
        IrExpr::UnaryOp {
            op: op.to_string(),
            operand: Box::new(operand),
            prefix: false,
        }
    }

    /// `base->field`
    pub fn arrow(base: IrExpr, field: impl Into<String>) -> IrExpr {
        IrExpr::Member {
            base: Box::new(base),
            field: field.into(),
            arrow: true,
        }
    }

    /// `base.field`
    pub fn dot(base: IrExpr, field: impl Into<String>) -> IrExpr {
        IrExpr::Member {
            base: Box::new(base),
            field: field.into(),
            arrow: false,
        }
    }

    pub fn index(base: IrExpr, index: IrExpr) -> IrExpr {
        IrExpr::Index {
            base: Box::new(base),
            index: Box::new(index),
        }
    }

    pub fn cast(c_type: impl Into<String>, value: IrExpr) -> IrExpr {
        IrExpr::Cast {
            c_type: c_type.into(),
            value: Box::new(value),
        }
    }

    pub fn addr(value: IrExpr) -> IrExpr {
        IrExpr::unary("&", value)
    }
}

impl IrStmt {
    pub fn expr(e: IrExpr) -> IrStmt {
        IrStmt::ExprStmt(e)
    }

    pub fn var_decl(c_type: impl Into<String>, name: impl Into<String>, init: Option<IrExpr>) -> IrStmt {
        IrStmt::VarDecl {
            c_type: c_type.into(),
            name: name.into(),
            init,
        }
    }

    pub fn assign(target: IrExpr, value: IrExpr) -> IrStmt {
        IrStmt::Assign {
            target,
            op: "=".to_string(),
            value,
        }
    }
}
