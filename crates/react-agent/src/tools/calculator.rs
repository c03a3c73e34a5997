use std::f64::consts;
use std::future::ready;

use react_agent_core::tool::{Error as ToolError, Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize, JsonSchema)]
pub struct CalculatorParameters {
    #[schemars(
        description = "Math expression, e.g. '2 + 2', '10 * 5', 'sqrt(16)' or '2 ** 10'."
    )]
    expression: String,
}

/// A tool for evaluating math expressions.
pub struct CalculatorTool {
    parameter_schema: Value,
}

impl CalculatorTool {
    /// Creates a new calculator tool.
    #[inline]
    pub fn new() -> Self {
        CalculatorTool {
            parameter_schema: schema_for!(CalculatorParameters).to_value(),
        }
    }
}

impl Default for CalculatorTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for CalculatorTool {
    type Input = CalculatorParameters;

    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluates math expressions. Supports +, -, *, /, ** (power), \
         parentheses, the constants pi and e, and the functions sqrt, pow, \
         log, sin, cos and tan."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let result = evaluate(&input.expression)
            .map(format_number)
            .map_err(|reason| ToolError::execution_error().with_reason(reason));
        ready(result)
    }
}

const MAX_EXPRESSION_LEN: usize = 1000;
const MAX_DEPTH: usize = 64;

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Evaluates a math expression.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    if expr.len() > MAX_EXPRESSION_LEN {
        return Err(format!(
            "Expression is too long (over {MAX_EXPRESSION_LEN} characters)"
        ));
    }
    let tokens = tokenize(expr)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.parse_expr()?;
    if let Some(token) = parser.peek() {
        return Err(format!("Unexpected token: {token:?}"));
    }
    if !value.is_finite() {
        return Err("Result is not a finite number".to_owned());
    }
    Ok(value)
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Comma,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = vec![];
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        let token = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => {
                chars.next();
                if chars.next_if_eq(&'*').is_some() {
                    tokens.push(Token::StarStar);
                } else {
                    tokens.push(Token::Star);
                }
                continue;
            }
            '/' => Token::Slash,
            ',' => Token::Comma,
            '(' => Token::LParen,
            ')' => Token::RParen,
            c if c.is_ascii_digit() || c == '.' => {
                let mut literal = String::new();
                while let Some(c) =
                    chars.next_if(|c| c.is_ascii_digit() || *c == '.')
                {
                    literal.push(c);
                }
                let number = literal
                    .parse()
                    .map_err(|_| format!("Invalid number: {literal}"))?;
                tokens.push(Token::Number(number));
                continue;
            }
            c if c.is_ascii_alphabetic() => {
                let mut ident = String::new();
                while let Some(c) = chars.next_if(char::is_ascii_alphanumeric) {
                    ident.push(c);
                }
                tokens.push(Token::Ident(ident));
                continue;
            }
            c => return Err(format!("Unexpected character: '{c}'")),
        };
        chars.next();
        tokens.push(token);
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    // Every recursive rule goes through here, which caps the stack depth.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, String>,
    ) -> Result<T, String> {
        if self.depth >= MAX_DEPTH {
            return Err("Expression is nested too deeply".to_owned());
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        match self.consume() {
            Some(token) if *token == expected => Ok(()),
            Some(token) => Err(format!("Expected {expected:?}, found {token:?}")),
            None => Err(format!("Expected {expected:?} at end of expression")),
        }
    }

    // expr = term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<f64, String> {
        let mut left = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.consume();
                    left += self.parse_term()?;
                }
                Some(Token::Minus) => {
                    self.consume();
                    left -= self.parse_term()?;
                }
                _ => return Ok(left),
            }
        }
    }

    // term = unary (('*' | '/') unary)*
    fn parse_term(&mut self) -> Result<f64, String> {
        let mut left = self.parse_unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.consume();
                    left *= self.parse_unary()?;
                }
                Some(Token::Slash) => {
                    self.consume();
                    let right = self.parse_unary()?;
                    if right == 0.0 {
                        return Err("Division by zero".to_owned());
                    }
                    left /= right;
                }
                _ => return Ok(left),
            }
        }
    }

    // unary = ('-' | '+') unary | power
    fn parse_unary(&mut self) -> Result<f64, String> {
        self.nested(|this| match this.peek() {
            Some(Token::Minus) => {
                this.consume();
                Ok(-this.parse_unary()?)
            }
            Some(Token::Plus) => {
                this.consume();
                this.parse_unary()
            }
            _ => this.parse_power(),
        })
    }

    // power = primary ('**' unary)?
    //
    // Binds tighter than a unary minus on its left, so `-2 ** 2` is -4.
    fn parse_power(&mut self) -> Result<f64, String> {
        let base = self.parse_primary()?;
        if let Some(Token::StarStar) = self.peek() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    // primary = NUMBER | IDENT | IDENT '(' args ')' | '(' expr ')'
    fn parse_primary(&mut self) -> Result<f64, String> {
        self.nested(Self::parse_atom)
    }

    fn parse_atom(&mut self) -> Result<f64, String> {
        match self.consume().cloned() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.consume();
                    let args = self.parse_args()?;
                    call(&name, &args)
                } else {
                    constant(&name)
                }
            }
            Some(token) => Err(format!("Unexpected token: {token:?}")),
            None => Err("Unexpected end of expression".to_owned()),
        }
    }

    // args = expr (',' expr)* ')'
    fn parse_args(&mut self) -> Result<Vec<f64>, String> {
        let mut args = vec![self.parse_expr()?];
        while let Some(Token::Comma) = self.peek() {
            self.consume();
            args.push(self.parse_expr()?);
        }
        self.expect(Token::RParen)?;
        Ok(args)
    }
}

fn constant(name: &str) -> Result<f64, String> {
    match name {
        "pi" => Ok(consts::PI),
        "e" => Ok(consts::E),
        _ => Err(format!("Unknown identifier: {name}")),
    }
}

fn call(name: &str, args: &[f64]) -> Result<f64, String> {
    match (name, args) {
        ("sqrt", [x]) if *x < 0.0 => {
            Err("Square root of a negative number".to_owned())
        }
        ("sqrt", [x]) => Ok(x.sqrt()),
        ("pow", [x, y]) => Ok(x.powf(*y)),
        ("log", [x]) | ("log", [x, _]) if *x <= 0.0 => {
            Err("Logarithm of a non-positive number".to_owned())
        }
        ("log", [x]) => Ok(x.ln()),
        ("log", [x, base]) => Ok(x.log(*base)),
        ("sin", [x]) => Ok(x.sin()),
        ("cos", [x]) => Ok(x.cos()),
        ("tan", [x]) => Ok(x.tan()),
        ("sqrt" | "sin" | "cos" | "tan", _) => {
            Err(format!("{name}() takes 1 argument, got {}", args.len()))
        }
        ("pow", _) => {
            Err(format!("pow() takes 2 arguments, got {}", args.len()))
        }
        ("log", _) => {
            Err(format!("log() takes 1 or 2 arguments, got {}", args.len()))
        }
        _ => Err(format!("Unknown function: {name}")),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use react_agent_core::tool::ErrorKind;
    use react_agent_core::{Dispatcher, Registry};
    use serde_json::Map;

    use super::*;

    fn approx(expr: &str, expected: f64) {
        let value = evaluate(expr).unwrap();
        assert!(
            (value - expected).abs() < 1e-9,
            "{expr} = {value}, expected {expected}"
        );
    }

    #[test]
    fn test_arithmetic() {
        approx("2 + 3", 5.0);
        approx("2 + 3 * 4", 14.0);
        approx("(2 + 3) * 4", 20.0);
        approx("10 / 4", 2.5);
        approx("(10 + 5) / 3 - 2 * (1 + 1)", 1.0);
        approx("3.14 * 2", 6.28);
    }

    #[test]
    fn test_unary_and_power() {
        approx("-5 + 3", -2.0);
        approx("2 ** 10", 1024.0);
        approx("2 ** 3 ** 2", 512.0);
        approx("-2 ** 2", -4.0);
        approx("2 ** -1", 0.5);
        approx("--3", 3.0);
    }

    #[test]
    fn test_functions_and_constants() {
        approx("sqrt(16)", 4.0);
        approx("pow(2, 8)", 256.0);
        approx("log(e)", 1.0);
        approx("log(100, 10)", 2.0);
        approx("sin(0) + cos(0)", 1.0);
        approx("tan(pi / 4)", 1.0);
        approx("sqrt(pow(3, 2) + pow(4, 2))", 5.0);
    }

    #[test]
    fn test_errors() {
        assert_eq!(evaluate("1 / 0").unwrap_err(), "Division by zero");
        assert_eq!(evaluate("foo + 1").unwrap_err(), "Unknown identifier: foo");
        assert_eq!(evaluate("exp(1)").unwrap_err(), "Unknown function: exp");
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("").is_err());
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("1 + 2)").is_err());
        assert!(evaluate("2 $ 3").is_err());
        assert!(evaluate("sqrt(-1)").is_err());
        assert!(evaluate("log(0)").is_err());
        assert!(evaluate("pow(2)").is_err());
        assert!(evaluate("10 ** 400").is_err());
    }

    #[test]
    fn test_limits() {
        approx(&format!("{}1{}", "(".repeat(20), ")".repeat(20)), 1.0);
        approx(&format!("{}1", "-".repeat(20)), 1.0);

        assert_eq!(
            evaluate(&format!("{}1", "-".repeat(500))).unwrap_err(),
            "Expression is nested too deeply"
        );
        assert_eq!(
            evaluate(&format!("{}1{}", "(".repeat(100), ")".repeat(100)))
                .unwrap_err(),
            "Expression is nested too deeply"
        );
        assert!(
            evaluate(&"1+".repeat(600))
                .unwrap_err()
                .starts_with("Expression is too long")
        );
    }

    #[tokio::test]
    async fn test_hostile_input_becomes_failure() {
        let registry = Arc::new(Registry::new());
        registry.register(CalculatorTool::new());
        let dispatcher = Dispatcher::new(registry, None);

        for expression in [
            format!("{}1", "-".repeat(200_000)),
            "(".repeat(100_000),
            format!("{}1", "-".repeat(900)),
        ] {
            let mut input = Map::new();
            input.insert("expression".to_owned(), Value::String(expression));
            let obs = dispatcher.call("calculator", input).await;
            assert!(!obs.is_success());
            assert!(obs.content().starts_with("Execution error: Expression is"));
        }
    }

    #[tokio::test]
    async fn test_execute() {
        let tool = CalculatorTool::new();
        let input = |expression: &str| CalculatorParameters {
            expression: expression.to_owned(),
        };

        assert_eq!(tool.execute(input("10 / 2")).await.unwrap(), "5");
        assert!(tool.execute(input("10 / 3")).await.unwrap().starts_with("3.333"));

        let err = tool.execute(input("1 / 0")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionError);
        assert_eq!(err.to_string(), "Execution error: Division by zero");
    }

    #[test]
    fn test_schema() {
        let tool = CalculatorTool::new();
        let schema = tool.parameter_schema();
        assert_eq!(schema["properties"]["expression"]["type"], "string");
        assert_eq!(schema["required"][0], "expression");
    }
}
