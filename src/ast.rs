use std::fmt::Write;

use serde::Serialize;

use crate::resolver::Resolution;

/// Identity of a reference node (call or variable), assigned by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDecl {
    pub name: String,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableDecl {
    pub name: String,
    pub type_name: String, // not enforced
    pub init: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Statement {
    Import { path: String },
    Function(FunctionDecl),
    Variable(VariableDecl),
    Expression(Expression),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expression {
    StringLiteral(String),
    IntegerLiteral(i64),
    DecimalLiteral(f32),
    BooleanLiteral(bool),
    NullLiteral,
    Variable {
        id: NodeId,
        name: String,
    },
    FunctionCall {
        id: NodeId,
        name: String,
        args: Vec<Expression>,
    },
    ExternalCall {
        module: String,
        function: String,
        args: Vec<Expression>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOperator {
    Assign,
    AddAssign,
    SubtractAssign,
    MultiplyAssign,
    DivideAssign,
    ModuloAssign,
    BitAndAssign,
    BitOrAssign,
    BitXorAssign,
    TildeAssign,
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    ShiftLeft,
    ShiftRight,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl BinaryOperator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        use BinaryOperator::*;
        let op = match symbol {
            "=" => Assign,
            "+=" => AddAssign,
            "-=" => SubtractAssign,
            "*=" => MultiplyAssign,
            "/=" => DivideAssign,
            "%=" => ModuloAssign,
            "&=" => BitAndAssign,
            "|=" => BitOrAssign,
            "^=" => BitXorAssign,
            "~=" => TildeAssign,
            "||" => Or,
            "&&" => And,
            "|" => BitOr,
            "^" => BitXor,
            "&" => BitAnd,
            "==" => Equal,
            "!=" => NotEqual,
            ">" => Greater,
            ">=" => GreaterEqual,
            "<" => Less,
            "<=" => LessEqual,
            "<<" => ShiftLeft,
            ">>" => ShiftRight,
            "+" => Add,
            "-" => Subtract,
            "*" => Multiply,
            "/" => Divide,
            "%" => Modulo,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(self) -> &'static str {
        use BinaryOperator::*;
        match self {
            Assign => "=",
            AddAssign => "+=",
            SubtractAssign => "-=",
            MultiplyAssign => "*=",
            DivideAssign => "/=",
            ModuloAssign => "%=",
            BitAndAssign => "&=",
            BitOrAssign => "|=",
            BitXorAssign => "^=",
            TildeAssign => "~=",
            Or => "||",
            And => "&&",
            BitOr => "|",
            BitXor => "^",
            BitAnd => "&",
            Equal => "==",
            NotEqual => "!=",
            Greater => ">",
            GreaterEqual => ">=",
            Less => "<",
            LessEqual => "<=",
            ShiftLeft => "<<",
            ShiftRight => ">>",
            Add => "+",
            Subtract => "-",
            Multiply => "*",
            Divide => "/",
            Modulo => "%",
        }
    }

    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        use BinaryOperator::*;
        match self {
            Assign | AddAssign | SubtractAssign | MultiplyAssign | DivideAssign | ModuloAssign
            | BitAndAssign | BitOrAssign | BitXorAssign | TildeAssign => 2,
            Or => 4,
            And => 5,
            BitOr => 6,
            BitXor => 7,
            BitAnd => 8,
            Equal | NotEqual => 9,
            Greater | GreaterEqual | Less | LessEqual => 10,
            ShiftLeft | ShiftRight => 11,
            Add | Subtract => 12,
            Multiply | Divide | Modulo => 13,
        }
    }

    pub fn is_assignment(self) -> bool {
        self.precedence() == 2
    }

    /// The operator a compound assignment applies before storing.
    /// `None` for plain `=` and for `~=`, which has no base operator.
    pub fn compound_base(self) -> Option<BinaryOperator> {
        use BinaryOperator::*;
        match self {
            AddAssign => Some(Add),
            SubtractAssign => Some(Subtract),
            MultiplyAssign => Some(Multiply),
            DivideAssign => Some(Divide),
            ModuloAssign => Some(Modulo),
            BitAndAssign => Some(BitAnd),
            BitOrAssign => Some(BitOr),
            BitXorAssign => Some(BitXor),
            _ => None,
        }
    }
}

impl Program {
    /// Indented tree dump. With a resolution, references report whether they
    /// were linked to a declaration.
    pub fn dump(&self, resolution: Option<&Resolution>) -> String {
        let mut out = String::new();
        out.push_str("Program\n");
        for statement in &self.statements {
            statement.dump_into(&mut out, 1, resolution);
        }
        out
    }
}

impl Statement {
    fn dump_into(&self, out: &mut String, depth: usize, resolution: Option<&Resolution>) {
        let indent = "\t".repeat(depth);
        match self {
            Statement::Import { path } => {
                let _ = writeln!(out, "{}Import {}", indent, path);
            }
            Statement::Function(decl) => {
                let _ = writeln!(out, "{}FunctionDecl {}", indent, decl.name);
                let _ = writeln!(out, "{}\tBlock", indent);
                for statement in &decl.body.statements {
                    statement.dump_into(out, depth + 2, resolution);
                }
            }
            Statement::Variable(decl) => {
                let _ = writeln!(
                    out,
                    "{}VariableDecl {}, type {}",
                    indent, decl.name, decl.type_name
                );
                match &decl.init {
                    Some(init) => init.dump_into(out, depth + 1, resolution),
                    None => {
                        let _ = writeln!(out, "{}\tno initialization", indent);
                    }
                }
            }
            Statement::Expression(expr) => {
                let _ = writeln!(out, "{}ExpressionStatement", indent);
                expr.dump_into(out, depth + 1, resolution);
            }
        }
    }
}

impl Expression {
    fn dump_into(&self, out: &mut String, depth: usize, resolution: Option<&Resolution>) {
        let indent = "\t".repeat(depth);
        let status = |id: &NodeId| match resolution {
            Some(r) if r.symbol_for(*id).is_some() => ", resolved",
            Some(_) => ", not resolved",
            None => "",
        };
        match self {
            Expression::StringLiteral(value) => {
                let _ = writeln!(out, "{}\"{}\"", indent, value);
            }
            Expression::IntegerLiteral(value) => {
                let _ = writeln!(out, "{}{}", indent, value);
            }
            Expression::DecimalLiteral(value) => {
                let _ = writeln!(out, "{}{:?}", indent, value);
            }
            Expression::BooleanLiteral(value) => {
                let _ = writeln!(out, "{}{}", indent, value);
            }
            Expression::NullLiteral => {
                let _ = writeln!(out, "{}null", indent);
            }
            Expression::Variable { id, name } => {
                let _ = writeln!(out, "{}Variable {}{}", indent, name, status(id));
            }
            Expression::FunctionCall { id, name, args } => {
                let _ = writeln!(out, "{}FunctionCall {}{}", indent, name, status(id));
                for arg in args {
                    arg.dump_into(out, depth + 1, resolution);
                }
            }
            Expression::ExternalCall {
                module,
                function,
                args,
            } => {
                let _ = writeln!(out, "{}ExternalCall {}::{}", indent, module, function);
                for arg in args {
                    arg.dump_into(out, depth + 1, resolution);
                }
            }
            Expression::Binary { op, left, right } => {
                let _ = writeln!(out, "{}Binary {}", indent, op.symbol());
                left.dump_into(out, depth + 1, resolution);
                right.dump_into(out, depth + 1, resolution);
            }
        }
    }
}
