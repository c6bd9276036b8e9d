use super::ast::*;
use super::RoutineError;
use crate::lib::calculator::Values;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Object(Vec<(String, Value)>),
}

impl Value {
    fn to_number(&self) -> Result<f64, RoutineError> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Object(_) => Err(RoutineError::Eval(
                "an object cannot be used as a number".to_string(),
            )),
        }
    }
    fn truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Bool(b) => *b,
            Value::Object(_) => true,
        }
    }
}

struct Binding {
    value: Value,
    constant: bool,
}

enum Flow {
    Continue,
    Return(Option<Value>),
}

/// Executes one routine invocation against a set of inputs.
pub struct Interpreter<'a> {
    inputs: &'a Values,
    scopes: Vec<HashMap<String, Binding>>,
}

impl<'a> Interpreter<'a> {
    pub fn new(inputs: &'a Values) -> Self {
        Self {
            inputs,
            scopes: vec![HashMap::new()],
        }
    }

    /// Runs the program; `None` when it finishes without `return`.
    pub fn run(mut self, program: &[Statement]) -> Result<Option<Value>, RoutineError> {
        match self.statements(program)? {
            Flow::Return(value) => Ok(value),
            Flow::Continue => Ok(None),
        }
    }

    fn input(&self, name: &str) -> Result<f64, RoutineError> {
        self.inputs
            .get(name)
            .copied()
            .ok_or_else(|| RoutineError::Eval(format!("no input named `{name}`")))
    }

    fn declare(&mut self, name: &str, value: Value, kind: DeclarationKind) {
        let scope = match kind {
            DeclarationKind::Var => self.scopes.first_mut(),
            DeclarationKind::Const | DeclarationKind::Let => self.scopes.last_mut(),
        };
        if let Some(scope) = scope {
            let constant = kind == DeclarationKind::Const;
            scope.insert(name.to_string(), Binding { value, constant });
        }
    }

    fn lookup(&self, name: &str) -> Result<&Binding, RoutineError> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .ok_or_else(|| RoutineError::Eval(format!("`{name}` is not defined")))
    }

    fn lookup_mut(&mut self, name: &str) -> Result<&mut Binding, RoutineError> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
            .ok_or_else(|| RoutineError::Eval(format!("`{name}` is not defined")))
    }

    fn scoped(&mut self, statements: &[Statement]) -> Result<Flow, RoutineError> {
        self.scopes.push(HashMap::new());
        let flow = self.statements(statements);
        self.scopes.pop();
        flow
    }

    fn statements(&mut self, statements: &[Statement]) -> Result<Flow, RoutineError> {
        for statement in statements {
            if let Flow::Return(value) = self.statement(statement)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Continue)
    }

    fn statement(&mut self, statement: &Statement) -> Result<Flow, RoutineError> {
        match statement {
            Statement::Declare {
                name,
                value,
                kind,
            } => {
                let value = self.expression(value)?;
                self.declare(name, value, *kind);
            }
            Statement::Destructure { bindings, kind } => {
                for (input, local) in bindings {
                    let value = Value::Number(self.input(input)?);
                    self.declare(local, value, *kind);
                }
            }
            Statement::Assign {
                name,
                operator,
                value,
            } => {
                let value = self.expression(value)?;
                let value = match operator {
                    Some(operator) => {
                        let current = self.lookup(name)?.value.clone();
                        binary(*operator, &current, &value)?
                    }
                    None => value,
                };
                let binding = self.lookup_mut(name)?;
                if binding.constant {
                    return Err(RoutineError::Eval(format!(
                        "assignment to constant `{name}`"
                    )));
                }
                binding.value = value;
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let branch = if self.expression(condition)?.truthy() {
                    then_branch
                } else {
                    else_branch
                };
                return self.scoped(branch);
            }
            Statement::Block(statements) => return self.scoped(statements),
            Statement::Sequence(statements) => return self.statements(statements),
            Statement::Return(value) => {
                let value = value.as_ref().map(|v| self.expression(v)).transpose()?;
                return Ok(Flow::Return(value));
            }
            Statement::Expression(expression) => {
                self.expression(expression)?;
            }
        }
        Ok(Flow::Continue)
    }

    fn expression(&mut self, expression: &Expression) -> Result<Value, RoutineError> {
        let value = match expression {
            Expression::Number(n) => Value::Number(*n),
            Expression::Bool(b) => Value::Bool(*b),
            Expression::Local(name) => self.lookup(name)?.value.clone(),
            Expression::Input(name) => Value::Number(self.input(name)?),
            Expression::Unary { operator, operand } => {
                let operand = self.expression(operand)?;
                match operator {
                    UnaryOperator::Negate => Value::Number(-operand.to_number()?),
                    UnaryOperator::Plus => Value::Number(operand.to_number()?),
                    UnaryOperator::Not => Value::Bool(!operand.truthy()),
                }
            }
            Expression::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.expression(left)?;
                let right = self.expression(right)?;
                binary(*operator, &left, &right)?
            }
            Expression::Logical {
                operator,
                left,
                right,
            } => {
                let left = self.expression(left)?;
                match (operator, left.truthy()) {
                    (LogicalOperator::And, false) | (LogicalOperator::Or, true) => left,
                    _ => self.expression(right)?,
                }
            }
            Expression::Conditional {
                condition,
                then_value,
                else_value,
            } => {
                if self.expression(condition)?.truthy() {
                    self.expression(then_value)?
                } else {
                    self.expression(else_value)?
                }
            }
            Expression::Call {
                function,
                arguments,
            } => {
                let arguments = arguments
                    .iter()
                    .map(|a| self.expression(a)?.to_number())
                    .collect::<Result<Vec<_>, _>>()?;
                call(*function, &arguments)
            }
            Expression::Object(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| Ok((key.clone(), self.expression(value)?)))
                    .collect::<Result<_, RoutineError>>()?,
            ),
        };
        Ok(value)
    }
}

fn binary(operator: BinaryOperator, left: &Value, right: &Value) -> Result<Value, RoutineError> {
    use BinaryOperator::*;
    let (l, r) = (left.to_number()?, right.to_number()?);
    let value = match operator {
        Add => Value::Number(l + r),
        Subtract => Value::Number(l - r),
        Multiply => Value::Number(l * r),
        Divide => Value::Number(l / r),
        Remainder => Value::Number(l % r),
        Power => Value::Number(l.powf(r)),
        Equal => Value::Bool(l == r),
        NotEqual => Value::Bool(l != r),
        Less => Value::Bool(l < r),
        LessOrEqual => Value::Bool(l <= r),
        Greater => Value::Bool(l > r),
        GreaterOrEqual => Value::Bool(l >= r),
    };
    Ok(value)
}

fn round_to(value: f64, digits: f64) -> f64 {
    let scale = 10f64.powi(digits.clamp(0.0, 100.0) as i32);
    (value * scale).round() / scale
}

/// Arity was checked when the routine was parsed.
fn call(function: Function, arguments: &[f64]) -> Value {
    use Function::*;
    let x = arguments.first().copied().unwrap_or(f64::NAN);
    let y = arguments.get(1).copied().unwrap_or(f64::NAN);
    let number = match function {
        Round => x.round(),
        Floor => x.floor(),
        Ceil => x.ceil(),
        Trunc => x.trunc(),
        Abs => x.abs(),
        Sign => {
            if x == 0.0 || x.is_nan() {
                x
            } else {
                x.signum()
            }
        }
        Sqrt => x.sqrt(),
        Cbrt => x.cbrt(),
        Exp => x.exp(),
        Log => x.ln(),
        Log10 => x.log10(),
        Log2 => x.log2(),
        Pow => x.powf(y),
        Min => arguments.iter().copied().fold(f64::INFINITY, |acc, v| {
            if acc.is_nan() || v.is_nan() {
                f64::NAN
            } else {
                acc.min(v)
            }
        }),
        Max => arguments.iter().copied().fold(f64::NEG_INFINITY, |acc, v| {
            if acc.is_nan() || v.is_nan() {
                f64::NAN
            } else {
                acc.max(v)
            }
        }),
        Hypot => arguments.iter().map(|v| v * v).sum::<f64>().sqrt(),
        Sin => x.sin(),
        Cos => x.cos(),
        Tan => x.tan(),
        Asin => x.asin(),
        Acos => x.acos(),
        Atan => x.atan(),
        Atan2 => x.atan2(y),
        IsFinite => return Value::Bool(x.is_finite()),
        IsNaN => return Value::Bool(x.is_nan()),
        ToNumber => x,
        ToFixed => round_to(x, if y.is_nan() { 0.0 } else { y }),
    };
    Value::Number(number)
}
