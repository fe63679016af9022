//! Evaluation of a parsed template against JSON data.

use serde_json::Value;

use super::TemplateError;
use super::format::{go_type, print_value};
use super::funcs;
use super::parse::{Branch, Command, Node, Operand, Pipeline};

/// Truthiness as text/template defines it: false, 0, null and empty
/// strings/collections are false.
pub(super) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

pub(super) fn execute(nodes: &[Node], root: &Value, out: &mut String) -> Result<(), TemplateError> {
    let mut state = State {
        vars: vec![("$".to_string(), root.clone())],
        out,
    };
    state.walk(nodes, root)
}

struct State<'o> {
    /// Variable stack, innermost last. `$` is the root data.
    vars: Vec<(String, Value)>,
    out: &'o mut String,
}

impl State<'_> {
    fn walk(&mut self, nodes: &[Node], dot: &Value) -> Result<(), TemplateError> {
        for node in nodes {
            match node {
                Node::Text(text) => self.out.push_str(text),
                Node::Action(pipeline) => {
                    let value = self.eval_pipeline(pipeline, dot)?;
                    // `{{$x := ...}}` declares without printing.
                    if pipeline.decl.is_empty() {
                        print_value(&value, self.out);
                    }
                }
                Node::If(branch) => {
                    let mark = self.vars.len();
                    let value = self.eval_pipeline(&branch.pipeline, dot)?;
                    let nodes = if is_truthy(&value) {
                        &branch.body
                    } else {
                        &branch.otherwise
                    };
                    let result = self.walk(nodes, dot);
                    self.vars.truncate(mark);
                    result?;
                }
                Node::With(branch) => {
                    let mark = self.vars.len();
                    let value = self.eval_pipeline(&branch.pipeline, dot)?;
                    let result = if is_truthy(&value) {
                        self.walk(&branch.body, &value)
                    } else {
                        self.walk(&branch.otherwise, dot)
                    };
                    self.vars.truncate(mark);
                    result?;
                }
                Node::Range(branch) => {
                    let mark = self.vars.len();
                    let result = self.walk_range(branch, dot);
                    self.vars.truncate(mark);
                    result?;
                }
            }
        }
        Ok(())
    }

    fn walk_range(&mut self, branch: &Branch, dot: &Value) -> Result<(), TemplateError> {
        let pipeline = &branch.pipeline;
        let value = self.eval_pipeline(pipeline, dot)?;

        let items: Vec<(Value, Value)> = match &value {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| (Value::from(i), item.clone()))
                .collect(),
            // Keys come out sorted, as text/template iterates maps.
            Value::Object(map) => map
                .iter()
                .map(|(key, item)| (Value::String(key.clone()), item.clone()))
                .collect(),
            Value::Null => Vec::new(),
            Value::Number(n) if !n.is_f64() => {
                if pipeline.decl.len() > 1 {
                    return Err(exec_error(
                        pipeline.line,
                        "can't use two iteration variables when ranging over an integer",
                    ));
                }
                let count = n.as_u64().unwrap_or(0);
                (0..count).map(|i| (Value::from(i), Value::from(i))).collect()
            }
            other => {
                return Err(exec_error(
                    pipeline.line,
                    format!("range can't iterate over {other}"),
                ));
            }
        };

        if items.is_empty() {
            return self.walk(&branch.otherwise, dot);
        }

        let mark = self.vars.len();
        for (key, item) in items {
            match pipeline.decl.as_slice() {
                [] => {}
                [elem] => self.set_var(elem, item.clone(), pipeline.line)?,
                [index, elem, ..] => {
                    self.set_var(index, key, pipeline.line)?;
                    self.set_var(elem, item.clone(), pipeline.line)?;
                }
            }
            let result = self.walk(&branch.body, &item);
            self.vars.truncate(mark);
            result?;
        }
        Ok(())
    }

    /// Evaluates the commands, then declares or assigns the pipeline's
    /// variables to the result.
    fn eval_pipeline(&mut self, pipeline: &Pipeline, dot: &Value) -> Result<Value, TemplateError> {
        let mut piped = None;
        for command in &pipeline.commands {
            piped = Some(self.eval_command(command, dot, piped, pipeline.line)?);
        }
        let value = piped.unwrap_or(Value::Null);

        for name in &pipeline.decl {
            if pipeline.assign {
                self.set_var(name, value.clone(), pipeline.line)?;
            } else {
                self.vars.push((name.clone(), value.clone()));
            }
        }
        Ok(value)
    }

    fn set_var(&mut self, name: &str, value: Value, line: usize) -> Result<(), TemplateError> {
        match self.vars.iter_mut().rev().find(|(n, _)| n == name) {
            Some((_, slot)) => {
                *slot = value;
                Ok(())
            }
            None => Err(exec_error(line, format!("undefined variable: {name}"))),
        }
    }

    fn var(&self, name: &str, line: usize) -> Result<&Value, TemplateError> {
        self.vars
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
            .ok_or_else(|| exec_error(line, format!("undefined variable: {name}")))
    }

    fn eval_command(
        &self,
        command: &Command,
        dot: &Value,
        piped: Option<Value>,
        line: usize,
    ) -> Result<Value, TemplateError> {
        let Some((first, rest)) = command.operands.split_first() else {
            return Err(exec_error(line, "empty command"));
        };

        if let Operand::Func(name) = first {
            let mut args = rest
                .iter()
                .map(|operand| self.eval_operand(operand, dot, line))
                .collect::<Result<Vec<_>, _>>()?;
            args.extend(piped);
            return call(name, &args, line);
        }

        if !rest.is_empty() || piped.is_some() {
            return Err(exec_error(line, "can't give argument to non-function"));
        }
        self.eval_operand(first, dot, line)
    }

    fn eval_operand(&self, operand: &Operand, dot: &Value, line: usize) -> Result<Value, TemplateError> {
        match operand {
            Operand::Field(path) => eval_field(path, dot, line),
            Operand::Var { name, path } => eval_field(path, self.var(name, line)?, line),
            Operand::Str(s) => Ok(Value::String(s.clone())),
            Operand::Int(n) => Ok(Value::from(*n)),
            Operand::Float(f) => Ok(Value::from(*f)),
            Operand::Bool(b) => Ok(Value::Bool(*b)),
            // A function in argument position is called without arguments.
            Operand::Func(name) => call(name, &[], line),
            Operand::Sub(pipeline) => {
                let mut piped = None;
                for command in &pipeline.commands {
                    piped = Some(self.eval_command(command, dot, piped, pipeline.line)?);
                }
                Ok(piped.unwrap_or(Value::Null))
            }
        }
    }
}

fn exec_error(line: usize, message: impl Into<String>) -> TemplateError {
    TemplateError::Exec {
        line,
        message: message.into(),
    }
}

fn eval_field(path: &[String], dot: &Value, line: usize) -> Result<Value, TemplateError> {
    let mut current = dot;
    for name in path {
        current = match current {
            Value::Object(map) => map
                .get(name)
                .ok_or_else(|| exec_error(line, format!("can't evaluate field {name}")))?,
            Value::Null => {
                return Err(exec_error(
                    line,
                    format!("nil pointer evaluating field {name}"),
                ));
            }
            other => {
                return Err(exec_error(
                    line,
                    format!("can't evaluate field {name} in type {}", go_type(other)),
                ));
            }
        };
    }
    Ok(current.clone())
}

fn call(name: &str, args: &[Value], line: usize) -> Result<Value, TemplateError> {
    let func = funcs::lookup(name)
        .ok_or_else(|| exec_error(line, format!("function {name:?} not defined")))?;
    func(args).map_err(|message| exec_error(line, format!("error calling {name}: {message}")))
}
