#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Declare {
        name: String,
        value: Expression,
        kind: DeclarationKind,
    },
    /// `const { input: local, .. } = values`
    Destructure {
        bindings: Vec<(String, String)>,
        kind: DeclarationKind,
    },
    Assign {
        name: String,
        operator: Option<BinaryOperator>,
        value: Expression,
    },
    If {
        condition: Expression,
        then_branch: Vec<Statement>,
        else_branch: Vec<Statement>,
    },
    Block(Vec<Statement>),
    /// Several declarators of one `let`/`const`, in the enclosing scope.
    Sequence(Vec<Statement>),
    Return(Option<Expression>),
    Expression(Expression),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Const,
    Let,
    /// Bound in the routine's outermost scope, whatever block declares it.
    Var,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Number(f64),
    Bool(bool),
    Local(String),
    /// `values.name` or `values["name"]`
    Input(String),
    Unary {
        operator: UnaryOperator,
        operand: Box<Expression>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Logical {
        operator: LogicalOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Conditional {
        condition: Box<Expression>,
        then_value: Box<Expression>,
        else_value: Box<Expression>,
    },
    Call {
        function: Function,
        arguments: Vec<Expression>,
    },
    Object(Vec<(String, Expression)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Power,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

/// Every callable a routine can reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Round,
    Floor,
    Ceil,
    Trunc,
    Abs,
    Sign,
    Sqrt,
    Cbrt,
    Exp,
    Log,
    Log10,
    Log2,
    Pow,
    Min,
    Max,
    Hypot,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    IsFinite,
    IsNaN,
    /// `parseFloat(x)` and `Number(x)`
    ToNumber,
    /// `x.toFixed(digits)`
    ToFixed,
}

impl Function {
    pub fn from_math_member(name: &str) -> Option<Self> {
        let function = match name {
            "round" => Self::Round,
            "floor" => Self::Floor,
            "ceil" => Self::Ceil,
            "trunc" => Self::Trunc,
            "abs" => Self::Abs,
            "sign" => Self::Sign,
            "sqrt" => Self::Sqrt,
            "cbrt" => Self::Cbrt,
            "exp" => Self::Exp,
            "log" => Self::Log,
            "log10" => Self::Log10,
            "log2" => Self::Log2,
            "pow" => Self::Pow,
            "min" => Self::Min,
            "max" => Self::Max,
            "hypot" => Self::Hypot,
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            "asin" => Self::Asin,
            "acos" => Self::Acos,
            "atan" => Self::Atan,
            "atan2" => Self::Atan2,
            _ => return None,
        };
        Some(function)
    }

    pub fn from_global(name: &str) -> Option<Self> {
        match name {
            "isFinite" => Some(Self::IsFinite),
            "isNaN" => Some(Self::IsNaN),
            "parseFloat" | "Number" => Some(Self::ToNumber),
            _ => None,
        }
    }

    /// Accepted argument count: minimum and optional maximum.
    pub fn arity(self) -> (usize, Option<usize>) {
        match self {
            Self::Pow | Self::Atan2 => (2, Some(2)),
            Self::Min | Self::Max | Self::Hypot => (1, None),
            Self::ToFixed => (1, Some(2)),
            _ => (1, Some(1)),
        }
    }
}

pub fn math_constant(name: &str) -> Option<f64> {
    use std::f64::consts;
    let value = match name {
        "PI" => consts::PI,
        "E" => consts::E,
        "LN2" => consts::LN_2,
        "LN10" => consts::LN_10,
        "LOG2E" => consts::LOG2_E,
        "LOG10E" => consts::LOG10_E,
        "SQRT2" => consts::SQRT_2,
        "SQRT1_2" => consts::FRAC_1_SQRT_2,
        _ => return None,
    };
    Some(value)
}
