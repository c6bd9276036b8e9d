use super::ast::*;
use super::lexer::{Spanned, Token};
use super::RoutineError;

/// Deepest expression/statement nesting a routine may use.
const MAX_NESTING: usize = 64;

const RESERVED: [&str; 14] = [
    "values", "Math", "const", "let", "var", "if", "else", "return", "true", "false", "Infinity",
    "NaN", "function", "this",
];

pub struct Parser {
    tokens: Vec<Spanned>,
    position: usize,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Self {
            tokens,
            position: 0,
            depth: 0,
        }
    }

    pub fn program(&mut self) -> Result<Vec<Statement>, RoutineError> {
        let mut statements = Vec::new();
        while self.peek().is_some() {
            if let Some(statement) = self.statement()? {
                statements.push(statement);
            }
        }
        Ok(statements)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|s| &s.token)
    }
    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.position + ahead).map(|s| &s.token)
    }
    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).map(|s| s.token.clone());
        self.position += 1;
        token
    }
    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.position += 1;
            true
        } else {
            false
        }
    }
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Identifier(name)) if name == keyword) {
            self.position += 1;
            true
        } else {
            false
        }
    }
    fn error(&self, message: impl AsRef<str>) -> RoutineError {
        let location = match self.tokens.get(self.position) {
            Some(spanned) => format!("offset {}", spanned.offset),
            None => "end of routine".to_string(),
        };
        RoutineError::Parse(format!("{} at {location}", message.as_ref()))
    }
    fn expect(&mut self, token: Token) -> Result<(), RoutineError> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {token:?}")))
        }
    }
    fn identifier(&mut self) -> Result<String, RoutineError> {
        match self.peek() {
            Some(Token::Identifier(name)) => {
                let name = name.clone();
                self.position += 1;
                Ok(name)
            }
            _ => Err(self.error("expected identifier")),
        }
    }
    fn binding_name(&mut self) -> Result<String, RoutineError> {
        let name = self.identifier()?;
        if RESERVED.contains(&name.as_str()) {
            return Err(self.error(format!("`{name}` cannot be used as a variable")));
        }
        Ok(name)
    }
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, RoutineError>,
    ) -> Result<T, RoutineError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error("routine is nested too deeply"));
        }
        let result = parse(self);
        self.depth -= 1;
        result
    }
    /// Counts one more left-nested node of an operator chain; the caller
    /// gives the levels back with `self.depth -= levels` once the chain ends.
    fn chain_link(&mut self, levels: &mut usize) -> Result<(), RoutineError> {
        self.depth += 1;
        *levels += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error("routine is nested too deeply"));
        }
        Ok(())
    }

    fn statement(&mut self) -> Result<Option<Statement>, RoutineError> {
        self.nested(|p| p.statement_inner())
    }

    fn statement_inner(&mut self) -> Result<Option<Statement>, RoutineError> {
        if self.eat(&Token::Semicolon) {
            return Ok(None);
        }
        if self.eat(&Token::BraceOpen) {
            return Ok(Some(Statement::Block(self.block_rest()?)));
        }
        let keyword = match self.peek() {
            Some(Token::Identifier(keyword)) => Some(keyword.clone()),
            _ => None,
        };
        let statement = match keyword.as_deref() {
            Some("const" | "let" | "var") => self.declaration()?,
            Some("if") => return self.if_statement().map(Some),
            Some("return") => {
                self.position += 1;
                let value = match self.peek() {
                    None | Some(Token::Semicolon | Token::BraceClose) => None,
                    Some(_) => Some(self.expression()?),
                };
                Statement::Return(value)
            }
            _ => self.assignment_or_expression()?,
        };
        self.eat(&Token::Semicolon);
        Ok(Some(statement))
    }

    fn block_rest(&mut self) -> Result<Vec<Statement>, RoutineError> {
        let mut statements = Vec::new();
        loop {
            match self.peek() {
                Some(Token::BraceClose) => {
                    self.position += 1;
                    return Ok(statements);
                }
                None => return Err(self.error("unclosed block")),
                Some(_) => statements.extend(self.statement()?),
            }
        }
    }

    fn branch(&mut self) -> Result<Vec<Statement>, RoutineError> {
        if self.eat(&Token::BraceOpen) {
            self.nested(|p| p.block_rest())
        } else {
            Ok(self.statement()?.into_iter().collect())
        }
    }

    fn if_statement(&mut self) -> Result<Statement, RoutineError> {
        self.eat_keyword("if");
        self.expect(Token::ParenOpen)?;
        let condition = self.expression()?;
        self.expect(Token::ParenClose)?;
        let then_branch = self.branch()?;
        let else_branch = if self.eat_keyword("else") {
            self.branch()?
        } else {
            Vec::new()
        };
        Ok(Statement::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn declaration(&mut self) -> Result<Statement, RoutineError> {
        let kind = match self.advance() {
            Some(Token::Identifier(k)) if k == "const" => DeclarationKind::Const,
            Some(Token::Identifier(k)) if k == "let" => DeclarationKind::Let,
            _ => DeclarationKind::Var,
        };

        if self.eat(&Token::BraceOpen) {
            let mut bindings = Vec::new();
            while !self.eat(&Token::BraceClose) {
                let input = self.identifier()?;
                let local = if self.eat(&Token::Colon) {
                    self.binding_name()?
                } else {
                    input.clone()
                };
                if RESERVED.contains(&local.as_str()) {
                    return Err(self.error(format!("`{local}` cannot be used as a variable")));
                }
                bindings.push((input, local));
                if !self.eat(&Token::Comma) {
                    self.expect(Token::BraceClose)?;
                    break;
                }
            }
            self.expect(Token::Assign)?;
            if !self.eat_keyword("values") {
                return Err(self.error("only `values` can be destructured"));
            }
            return Ok(Statement::Destructure { bindings, kind });
        }

        let mut declarations = Vec::new();
        loop {
            let name = self.binding_name()?;
            let value = if self.eat(&Token::Assign) {
                self.expression()?
            } else {
                Expression::Number(f64::NAN)
            };
            declarations.push(Statement::Declare { name, value, kind });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(if declarations.len() == 1 {
            declarations.remove(0)
        } else {
            Statement::Sequence(declarations)
        })
    }

    fn assignment_or_expression(&mut self) -> Result<Statement, RoutineError> {
        let target = match (self.peek(), self.peek_at(1)) {
            (Some(Token::Identifier(name)), Some(next)) => {
                let operator = match next {
                    Token::Assign => Some(None),
                    Token::PlusAssign => Some(Some(BinaryOperator::Add)),
                    Token::MinusAssign => Some(Some(BinaryOperator::Subtract)),
                    Token::StarAssign => Some(Some(BinaryOperator::Multiply)),
                    Token::SlashAssign => Some(Some(BinaryOperator::Divide)),
                    _ => None,
                };
                operator.map(|operator| (name.clone(), operator))
            }
            _ => None,
        };
        let Some((name, operator)) = target else {
            return Ok(Statement::Expression(self.expression()?));
        };
        if RESERVED.contains(&name.as_str()) {
            return Err(self.error(format!("cannot assign to `{name}`")));
        }
        self.position += 2;
        let value = self.expression()?;
        Ok(Statement::Assign {
            name,
            operator,
            value,
        })
    }

    pub fn expression(&mut self) -> Result<Expression, RoutineError> {
        self.nested(|p| p.conditional())
    }

    fn conditional(&mut self) -> Result<Expression, RoutineError> {
        let condition = self.logical_or()?;
        if !self.eat(&Token::Question) {
            return Ok(condition);
        }
        let then_value = self.expression()?;
        self.expect(Token::Colon)?;
        let else_value = self.expression()?;
        Ok(Expression::Conditional {
            condition: Box::new(condition),
            then_value: Box::new(then_value),
            else_value: Box::new(else_value),
        })
    }

    fn logical_or(&mut self) -> Result<Expression, RoutineError> {
        self.logical_level(Self::logical_and, Token::OrOr, LogicalOperator::Or)
    }

    fn logical_and(&mut self) -> Result<Expression, RoutineError> {
        self.logical_level(Self::equality, Token::AndAnd, LogicalOperator::And)
    }

    fn logical_level(
        &mut self,
        operand: fn(&mut Self) -> Result<Expression, RoutineError>,
        token: Token,
        operator: LogicalOperator,
    ) -> Result<Expression, RoutineError> {
        let mut left = operand(self)?;
        let mut levels = 0;
        while self.eat(&token) {
            self.chain_link(&mut levels)?;
            let right = operand(self)?;
            left = Expression::Logical {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth -= levels;
        Ok(left)
    }

    fn binary_level(
        &mut self,
        operand: fn(&mut Self) -> Result<Expression, RoutineError>,
        operators: &[(Token, BinaryOperator)],
    ) -> Result<Expression, RoutineError> {
        let mut left = operand(self)?;
        let mut levels = 0;
        'outer: loop {
            for (token, operator) in operators {
                if self.eat(token) {
                    self.chain_link(&mut levels)?;
                    let right = operand(self)?;
                    left = Expression::Binary {
                        operator: *operator,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                    continue 'outer;
                }
            }
            self.depth -= levels;
            return Ok(left);
        }
    }

    fn equality(&mut self) -> Result<Expression, RoutineError> {
        self.binary_level(
            Self::comparison,
            &[
                (Token::Equal, BinaryOperator::Equal),
                (Token::NotEqual, BinaryOperator::NotEqual),
            ],
        )
    }

    fn comparison(&mut self) -> Result<Expression, RoutineError> {
        self.binary_level(
            Self::additive,
            &[
                (Token::LessOrEqual, BinaryOperator::LessOrEqual),
                (Token::GreaterOrEqual, BinaryOperator::GreaterOrEqual),
                (Token::Less, BinaryOperator::Less),
                (Token::Greater, BinaryOperator::Greater),
            ],
        )
    }

    fn additive(&mut self) -> Result<Expression, RoutineError> {
        self.binary_level(
            Self::multiplicative,
            &[
                (Token::Plus, BinaryOperator::Add),
                (Token::Minus, BinaryOperator::Subtract),
            ],
        )
    }

    fn multiplicative(&mut self) -> Result<Expression, RoutineError> {
        self.binary_level(
            Self::unary,
            &[
                (Token::Star, BinaryOperator::Multiply),
                (Token::Slash, BinaryOperator::Divide),
                (Token::Percent, BinaryOperator::Remainder),
            ],
        )
    }

    fn unary_operator(&self) -> Option<UnaryOperator> {
        match self.peek() {
            Some(Token::Minus) => Some(UnaryOperator::Negate),
            Some(Token::Plus) => Some(UnaryOperator::Plus),
            Some(Token::Bang) => Some(UnaryOperator::Not),
            _ => None,
        }
    }

    fn unary(&mut self) -> Result<Expression, RoutineError> {
        if self.unary_operator().is_none() {
            return self.power();
        }
        self.prefixed()
    }

    /// A unary expression, which may not be the base of `**`: `-2 ** 2` is
    /// rejected and has to be written `(-2) ** 2` or `-(2 ** 2)`.
    fn prefixed(&mut self) -> Result<Expression, RoutineError> {
        let Some(operator) = self.unary_operator() else {
            return self.postfix();
        };
        self.position += 1;
        let operand = self.nested(|p| p.prefixed())?;
        if self.peek() == Some(&Token::StarStar) {
            return Err(self.error("a unary expression before `**` needs parentheses"));
        }
        Ok(Expression::Unary {
            operator,
            operand: Box::new(operand),
        })
    }

    fn power(&mut self) -> Result<Expression, RoutineError> {
        let base = self.postfix()?;
        if !self.eat(&Token::StarStar) {
            return Ok(base);
        }
        let exponent = self.nested(|p| p.unary())?;
        Ok(Expression::Binary {
            operator: BinaryOperator::Power,
            left: Box::new(base),
            right: Box::new(exponent),
        })
    }

    fn postfix(&mut self) -> Result<Expression, RoutineError> {
        let mut expression = self.primary()?;
        let mut levels = 0;
        while self.peek() == Some(&Token::Dot) {
            self.position += 1;
            self.chain_link(&mut levels)?;
            let method = self.identifier()?;
            if method != "toFixed" {
                return Err(self.error(format!("unsupported member `.{method}`")));
            }
            let mut arguments = vec![expression];
            arguments.extend(self.arguments()?);
            expression = self.call(Function::ToFixed, arguments)?;
        }
        self.depth -= levels;
        Ok(expression)
    }

    fn arguments(&mut self) -> Result<Vec<Expression>, RoutineError> {
        self.expect(Token::ParenOpen)?;
        let mut arguments = Vec::new();
        while !self.eat(&Token::ParenClose) {
            arguments.push(self.expression()?);
            if !self.eat(&Token::Comma) {
                self.expect(Token::ParenClose)?;
                break;
            }
        }
        Ok(arguments)
    }

    fn call(
        &self,
        function: Function,
        arguments: Vec<Expression>,
    ) -> Result<Expression, RoutineError> {
        let (min, max) = function.arity();
        if arguments.len() < min || max.is_some_and(|max| arguments.len() > max) {
            return Err(self.error(format!(
                "{function:?} does not take {} arguments",
                arguments.len()
            )));
        }
        Ok(Expression::Call {
            function,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expression, RoutineError> {
        match self.advance() {
            Some(Token::Number(number)) => Ok(Expression::Number(number)),
            Some(Token::ParenOpen) => {
                let inner = self.expression()?;
                self.expect(Token::ParenClose)?;
                Ok(inner)
            }
            Some(Token::BraceOpen) => self.nested(|p| p.object_rest()),
            Some(Token::Identifier(name)) => self.named(name),
            Some(token) => {
                self.position -= 1;
                Err(self.error(format!("unexpected {token:?}")))
            }
            None => Err(self.error("unexpected end of routine")),
        }
    }

    fn named(&mut self, name: String) -> Result<Expression, RoutineError> {
        match name.as_str() {
            "true" => Ok(Expression::Bool(true)),
            "false" => Ok(Expression::Bool(false)),
            "Infinity" => Ok(Expression::Number(f64::INFINITY)),
            "NaN" => Ok(Expression::Number(f64::NAN)),
            "values" => {
                if self.eat(&Token::Dot) {
                    return Ok(Expression::Input(self.identifier()?));
                }
                self.expect(Token::BracketOpen)?;
                let Some(Token::Text(field)) = self.advance() else {
                    self.position -= 1;
                    return Err(self.error("expected a quoted field name"));
                };
                self.expect(Token::BracketClose)?;
                Ok(Expression::Input(field))
            }
            "Math" => {
                self.expect(Token::Dot)?;
                let member = self.identifier()?;
                if let Some(value) = math_constant(&member) {
                    return Ok(Expression::Number(value));
                }
                let function = Function::from_math_member(&member)
                    .ok_or_else(|| self.error(format!("unknown function `Math.{member}`")))?;
                let arguments = self.arguments()?;
                self.call(function, arguments)
            }
            _ if RESERVED.contains(&name.as_str()) => {
                Err(self.error(format!("unexpected keyword `{name}`")))
            }
            _ if self.peek() == Some(&Token::ParenOpen) => {
                let function = Function::from_global(&name)
                    .ok_or_else(|| self.error(format!("unknown function `{name}`")))?;
                let arguments = self.arguments()?;
                self.call(function, arguments)
            }
            _ => Ok(Expression::Local(name)),
        }
    }

    fn object_rest(&mut self) -> Result<Expression, RoutineError> {
        let mut entries = Vec::new();
        while !self.eat(&Token::BraceClose) {
            let key = match self.advance() {
                Some(Token::Identifier(key)) | Some(Token::Text(key)) => key,
                _ => {
                    self.position -= 1;
                    return Err(self.error("expected a property name"));
                }
            };
            let value = if self.eat(&Token::Colon) {
                self.expression()?
            } else {
                Expression::Local(key.clone())
            };
            entries.push((key, value));
            if !self.eat(&Token::Comma) {
                self.expect(Token::BraceClose)?;
                break;
            }
        }
        Ok(Expression::Object(entries))
    }
}
