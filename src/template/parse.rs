//! Recursive-descent parser from tokens to a node tree.

use super::TemplateError;
use super::funcs;
use super::lex::{Spanned, Token};

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Node {
    Text(String),
    Action(Pipeline),
    If(Branch),
    Range(Branch),
    With(Branch),
}

/// A control block: `{{if p}}body{{else}}otherwise{{end}}` and friends.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Branch {
    pub pipeline: Pipeline,
    pub body: Vec<Node>,
    pub otherwise: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Pipeline {
    /// Variables declared (`$x :=`) or assigned (`$x =`) by this pipeline.
    pub decl: Vec<String>,
    pub assign: bool,
    pub commands: Vec<Command>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Command {
    pub operands: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Operand {
    Field(Vec<String>),
    Var { name: String, path: Vec<String> },
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Func(String),
    Sub(Pipeline),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    If,
    Range,
    With,
}

impl BlockKind {
    fn keyword(self) -> &'static str {
        match self {
            BlockKind::If => "if",
            BlockKind::Range => "range",
            BlockKind::With => "with",
        }
    }
}

/// Why a node list stopped.
enum Stop {
    Eof,
    End { line: usize },
    Else { line: usize },
    ElseIf(Pipeline),
}

pub(super) fn parse(tokens: Vec<Spanned>) -> Result<Vec<Node>, TemplateError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        vars: vec!["$".to_string()],
    };
    let (nodes, stop) = parser.parse_nodes()?;
    match stop {
        Stop::Eof => Ok(nodes),
        Stop::End { line } => Err(parse_error(line, "unexpected {{end}}")),
        Stop::Else { line } => Err(parse_error(line, "unexpected {{else}}")),
        Stop::ElseIf(pipeline) => Err(parse_error(pipeline.line, "unexpected {{else if}}")),
    }
}

fn parse_error(line: usize, message: impl Into<String>) -> TemplateError {
    TemplateError::Parse {
        line,
        message: message.into(),
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Text(_) => "text".to_string(),
        Token::Open => "{{".to_string(),
        Token::Close => "}}".to_string(),
        Token::Field(path) if path.is_empty() => "<.>".to_string(),
        Token::Field(path) => format!("<.{}>", path.join(".")),
        Token::Var(name, path) if path.is_empty() => format!("<{name}>"),
        Token::Var(name, path) => format!("<{name}.{}>", path.join(".")),
        Token::Ident(name) => format!("<{name}>"),
        Token::Str(s) => format!("{s:?}"),
        Token::Int(n) => n.to_string(),
        Token::Float(f) => f.to_string(),
        Token::Declare => ":=".to_string(),
        Token::Assign => "=".to_string(),
        Token::Comma => ",".to_string(),
        Token::Pipe => "|".to_string(),
        Token::LParen => "(".to_string(),
        Token::RParen => ")".to_string(),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Variables in scope, innermost last. `$` is always defined.
    vars: Vec<String>,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn last_line(&self) -> usize {
        self.tokens.last().map_or(1, |t| t.line)
    }

    fn peek_ident(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Spanned { token: Token::Ident(name), .. }) if name == keyword)
    }

    fn expect_close(&mut self, context: &str) -> Result<(), TemplateError> {
        match self.next() {
            Some(Spanned {
                token: Token::Close,
                ..
            }) => Ok(()),
            Some(other) => Err(parse_error(
                other.line,
                format!("unexpected {} in {context}", describe(&other.token)),
            )),
            None => Err(parse_error(self.last_line(), format!("unclosed {context}"))),
        }
    }

    fn parse_nodes(&mut self) -> Result<(Vec<Node>, Stop), TemplateError> {
        let mut nodes = Vec::new();

        while let Some(spanned) = self.next() {
            match spanned.token {
                Token::Text(text) => nodes.push(Node::Text(text)),
                Token::Open => {
                    let line = spanned.line;
                    if self.peek_ident("end") {
                        self.pos += 1;
                        self.expect_close("end")?;
                        return Ok((nodes, Stop::End { line }));
                    }
                    if self.peek_ident("else") {
                        self.pos += 1;
                        if self.peek_ident("if") {
                            self.pos += 1;
                            let pipeline = self.parse_pipeline(line, "if")?;
                            return Ok((nodes, Stop::ElseIf(pipeline)));
                        }
                        self.expect_close("else")?;
                        return Ok((nodes, Stop::Else { line }));
                    }

                    let kind = if self.peek_ident("if") {
                        Some(BlockKind::If)
                    } else if self.peek_ident("range") {
                        Some(BlockKind::Range)
                    } else if self.peek_ident("with") {
                        Some(BlockKind::With)
                    } else {
                        None
                    };

                    match kind {
                        Some(kind) => {
                            self.pos += 1;
                            // Variables declared in the block's pipeline or body
                            // go out of scope at its {{end}}.
                            let mark = self.vars.len();
                            let pipeline = self.parse_pipeline(line, kind.keyword())?;
                            let block = self.parse_block(kind, pipeline, line);
                            self.vars.truncate(mark);
                            nodes.push(block?);
                        }
                        None => {
                            let pipeline = self.parse_pipeline(line, "command")?;
                            nodes.push(Node::Action(pipeline));
                        }
                    }
                }
                other => {
                    return Err(parse_error(
                        spanned.line,
                        format!("unexpected {} outside action", describe(&other)),
                    ));
                }
            }
        }

        Ok((nodes, Stop::Eof))
    }

    fn parse_block(
        &mut self,
        kind: BlockKind,
        pipeline: Pipeline,
        line: usize,
    ) -> Result<Node, TemplateError> {
        let (body, stop) = self.parse_nodes()?;

        let otherwise = match stop {
            Stop::End { .. } => Vec::new(),
            Stop::Else { .. } => {
                let (otherwise, stop) = self.parse_nodes()?;
                match stop {
                    Stop::End { .. } => otherwise,
                    Stop::Eof => {
                        return Err(parse_error(
                            self.last_line(),
                            format!("unexpected EOF: missing {{{{end}}}} for {{{{{}}}}} on line {line}", kind.keyword()),
                        ));
                    }
                    Stop::Else { line } => {
                        return Err(parse_error(line, "expected {{end}}; found {{else}}"));
                    }
                    Stop::ElseIf(p) => {
                        return Err(parse_error(p.line, "expected {{end}}; found {{else if}}"));
                    }
                }
            }
            // `{{else if q}}` is an `if` nested in the else branch; the nested
            // block consumes the shared `{{end}}`.
            Stop::ElseIf(nested) if kind == BlockKind::If => {
                let nested_line = nested.line;
                vec![self.parse_block(BlockKind::If, nested, nested_line)?]
            }
            Stop::ElseIf(p) => {
                return Err(parse_error(
                    p.line,
                    format!("{{{{else if}}}} is not allowed in {{{{{}}}}}", kind.keyword()),
                ));
            }
            Stop::Eof => {
                return Err(parse_error(
                    self.last_line(),
                    format!(
                        "unexpected EOF: missing {{{{end}}}} for {{{{{}}}}} on line {line}",
                        kind.keyword()
                    ),
                ));
            }
        };

        let branch = Branch {
            pipeline,
            body,
            otherwise,
        };
        Ok(match kind {
            BlockKind::If => Node::If(branch),
            BlockKind::Range => Node::Range(branch),
            BlockKind::With => Node::With(branch),
        })
    }

    /// Parses an optional declaration and the commands up to the closing `}}`.
    fn parse_pipeline(&mut self, line: usize, context: &str) -> Result<Pipeline, TemplateError> {
        let (decl, assign) = self.parse_declaration(line, context)?;
        let mut pipeline = self.parse_commands(line, context)?;
        self.expect_close(context)?;
        if !assign {
            self.vars.extend(decl.iter().cloned());
        }
        pipeline.decl = decl;
        pipeline.assign = assign;
        Ok(pipeline)
    }

    /// Consumes `$x :=`, `$x =` or, in a range, `$i, $e :=`. Leaves the
    /// position untouched when the pipeline doesn't start with one.
    fn parse_declaration(
        &mut self,
        line: usize,
        context: &str,
    ) -> Result<(Vec<String>, bool), TemplateError> {
        let mut names = Vec::new();
        let mut pos = self.pos;
        loop {
            let Some(Token::Var(name, path)) = self.tokens.get(pos).map(|t| &t.token) else {
                return Ok((Vec::new(), false));
            };
            if !path.is_empty() {
                return Ok((Vec::new(), false));
            }
            let name = name.clone();
            match self.tokens.get(pos + 1).map(|t| &t.token) {
                Some(Token::Comma) => {
                    names.push(name);
                    pos += 2;
                }
                Some(token @ (Token::Declare | Token::Assign)) => {
                    let assign = *token == Token::Assign;
                    names.push(name);
                    let max = if context == "range" { 2 } else { 1 };
                    if names.len() > max {
                        return Err(parse_error(line, format!("too many declarations in {context}")));
                    }
                    if assign {
                        self.check_defined(&names, line)?;
                    }
                    self.pos = pos + 2;
                    return Ok((names, assign));
                }
                _ => return Ok((Vec::new(), false)),
            }
        }
    }

    fn check_defined(&self, names: &[String], line: usize) -> Result<(), TemplateError> {
        match names.iter().find(|name| !self.vars.contains(name)) {
            Some(name) => Err(parse_error(line, format!("undefined variable {name:?}"))),
            None => Ok(()),
        }
    }

    /// Parses `cmd | cmd | ...`, stopping before `}}` or `)`.
    fn parse_commands(&mut self, line: usize, context: &str) -> Result<Pipeline, TemplateError> {
        let mut commands = Vec::new();
        loop {
            let command = self.parse_command()?;
            if command.operands.is_empty() {
                return Err(parse_error(line, format!("missing value for {context}")));
            }
            commands.push(command);

            if matches!(self.peek(), Some(Spanned { token: Token::Pipe, .. })) {
                self.pos += 1;
                continue;
            }
            return Ok(Pipeline {
                decl: Vec::new(),
                assign: false,
                commands,
                line,
            });
        }
    }

    fn parse_command(&mut self) -> Result<Command, TemplateError> {
        let mut operands = Vec::new();
        loop {
            let Some(spanned) = self.peek().cloned() else {
                return Ok(Command { operands });
            };
            let operand = match spanned.token {
                Token::Close | Token::Pipe | Token::RParen => return Ok(Command { operands }),
                Token::Field(path) => Operand::Field(path),
                Token::Var(name, path) => {
                    self.check_defined(std::slice::from_ref(&name), spanned.line)?;
                    Operand::Var { name, path }
                }
                Token::Str(s) => Operand::Str(s),
                Token::Int(n) => Operand::Int(n),
                Token::Float(f) => Operand::Float(f),
                Token::Ident(name) => match name.as_str() {
                    "true" => Operand::Bool(true),
                    "false" => Operand::Bool(false),
                    _ if funcs::lookup(&name).is_some() => Operand::Func(name.clone()),
                    _ => {
                        return Err(parse_error(
                            spanned.line,
                            format!("function {name:?} not defined"),
                        ));
                    }
                },
                Token::LParen => {
                    self.pos += 1;
                    let sub = self.parse_commands(spanned.line, "parenthesized pipeline")?;
                    match self.next() {
                        Some(Spanned {
                            token: Token::RParen,
                            ..
                        }) => {}
                        _ => return Err(parse_error(spanned.line, "unclosed left paren")),
                    }
                    operands.push(Operand::Sub(sub));
                    continue;
                }
                Token::Text(_) | Token::Open => {
                    return Err(parse_error(spanned.line, "unclosed action"));
                }
                token @ (Token::Declare | Token::Assign | Token::Comma) => {
                    return Err(parse_error(
                        spanned.line,
                        format!("unexpected {} in operand", describe(&token)),
                    ));
                }
            };
            self.pos += 1;
            operands.push(operand);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::lex::lex;

    fn parse_src(src: &str) -> Result<Vec<Node>, TemplateError> {
        parse(lex(src)?)
    }

    fn field(path: &[&str]) -> Operand {
        Operand::Field(path.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn text_and_action() {
        let nodes = parse_src("Branch: {{.Branch}}").unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::Text("Branch: ".into()),
                Node::Action(Pipeline {
                    decl: vec![],
                    assign: false,
                    commands: vec![Command {
                        operands: vec![field(&["Branch"])]
                    }],
                    line: 1,
                }),
            ]
        );
    }

    #[test]
    fn range_with_else() {
        let nodes = parse_src("{{range .Envs}}{{.}}{{else}}none{{end}}").unwrap();
        let [Node::Range(branch)] = nodes.as_slice() else {
            panic!("expected a single range node, got {nodes:?}");
        };
        assert_eq!(branch.body.len(), 1);
        assert_eq!(branch.otherwise, vec![Node::Text("none".into())]);
    }

    #[test]
    fn else_if_nests_into_else_branch() {
        let nodes = parse_src("{{if .A}}a{{else if .B}}b{{else}}c{{end}}").unwrap();
        let [Node::If(outer)] = nodes.as_slice() else {
            panic!("expected a single if node, got {nodes:?}");
        };
        let [Node::If(inner)] = outer.otherwise.as_slice() else {
            panic!("expected nested if, got {:?}", outer.otherwise);
        };
        assert_eq!(inner.body, vec![Node::Text("b".into())]);
        assert_eq!(inner.otherwise, vec![Node::Text("c".into())]);
    }

    #[test]
    fn pipes_and_parens() {
        let nodes = parse_src(r#"{{(replaceAll .Branch "/" "-") | len}}"#).unwrap();
        let [Node::Action(pipeline)] = nodes.as_slice() else {
            panic!("expected action");
        };
        assert_eq!(pipeline.commands.len(), 2);
        assert!(matches!(pipeline.commands[0].operands[0], Operand::Sub(_)));
        assert_eq!(pipeline.commands[1].operands, vec![Operand::Func("len".into())]);
    }

    #[test]
    fn missing_end_is_an_error() {
        let err = parse_src("{{range .AutoReleaseEnvironments}}\n {{.}}").unwrap_err();
        match err {
            TemplateError::Parse { message, .. } => {
                assert!(message.contains("missing {{end}}"), "{message}");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn stray_end_is_an_error() {
        assert!(parse_src("hello{{end}}").is_err());
    }

    #[test]
    fn stray_else_is_an_error() {
        assert!(parse_src("{{else}}").is_err());
    }

    #[test]
    fn double_else_is_an_error() {
        assert!(parse_src("{{if .A}}a{{else}}b{{else}}c{{end}}").is_err());
    }

    #[test]
    fn else_if_in_range_is_an_error() {
        assert!(parse_src("{{range .A}}a{{else if .B}}b{{end}}").is_err());
    }

    #[test]
    fn unknown_function_is_a_parse_error() {
        let err = parse_src("{{upper .Branch}}").unwrap_err();
        assert!(err.to_string().contains("\"upper\" not defined"));
    }

    #[test]
    fn range_declares_index_and_element() {
        let nodes = parse_src("{{range $i, $e := .Envs}}{{$i}}{{$e}}{{$.Branch}}{{end}}").unwrap();
        let [Node::Range(branch)] = nodes.as_slice() else {
            panic!("expected a single range node, got {nodes:?}");
        };
        assert_eq!(branch.pipeline.decl, vec!["$i".to_string(), "$e".to_string()]);
        assert!(!branch.pipeline.assign);
        let [_, _, Node::Action(root)] = branch.body.as_slice() else {
            panic!("expected three actions, got {:?}", branch.body);
        };
        assert_eq!(
            root.commands[0].operands,
            vec![Operand::Var {
                name: "$".into(),
                path: vec!["Branch".into()]
            }]
        );
    }

    #[test]
    fn variables_go_out_of_scope_at_end() {
        assert!(parse_src("{{$x := 1}}{{$x}}").is_ok());
        assert!(parse_src("{{if true}}{{$x := 1}}{{$x}}{{end}}").is_ok());
        let err = parse_src("{{if true}}{{$x := 1}}{{end}}{{$x}}").unwrap_err();
        assert!(err.to_string().contains("undefined variable \"$x\""), "{err}");
        assert!(parse_src("{{range $e := .A}}{{end}}{{$e}}").is_err());
    }

    #[test]
    fn assignment_needs_a_declared_variable() {
        assert!(parse_src("{{$x := 1}}{{$x = 2}}").is_ok());
        assert!(parse_src("{{$y = 2}}").is_err());
    }

    #[test]
    fn two_declarations_only_in_range() {
        assert!(parse_src("{{$a, $b := .X}}").is_err());
        assert!(parse_src("{{with $a, $b := .X}}{{end}}").is_err());
        assert!(parse_src("{{range $a, $b, $c := .X}}{{end}}").is_err());
    }

    #[test]
    fn stray_declaration_tokens_are_errors() {
        assert!(parse_src("{{len := .X}}").is_err());
        assert!(parse_src("{{.X, .Y}}").is_err());
    }

    #[test]
    fn empty_action_is_an_error() {
        assert!(parse_src("{{}}").is_err());
        assert!(parse_src("{{if}}x{{end}}").is_err());
    }

    #[test]
    fn unclosed_paren_is_an_error() {
        assert!(parse_src("{{(len .A}}").is_err());
    }
}
