use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use pest::{Parser, iterators::Pair};

use crate::{
    builtin,
    model::{Command, Commands, Entry, MdlGrammar, Parsed, Rule, Value},
    symbols::SymbolTable,
    unescape_string, ModelParser,
};

const MAX_INCLUDE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, Default)]
pub struct MdlParser;

impl ModelParser for MdlParser {
    fn parse_file(&self, path: &Path) -> Result<Parsed> {
        let mut loader = Loader::default();
        let commands = loader.load_file(path)?;
        Ok(Parsed { commands, symbols: loader.symbols.into_symbols() })
    }
}

impl MdlParser {
    /// Parses source text directly, includes are resolved against the current directory.
    pub fn parse_source(&self, source: &str) -> Result<Parsed> {
        let mut loader = Loader::default();
        let commands = loader.load_source(source, Path::new(""))?;
        Ok(Parsed { commands, symbols: loader.symbols.into_symbols() })
    }
}

// symbol table shared by included files, plus the stack of files being read
#[derive(Debug, Default)]
struct Loader {
    symbols: SymbolTable,
    includes: Vec<PathBuf>,
}

impl Loader {

    fn find_tag<'a>(tag: &'a str, pairs: &'a [Pair<'a, Rule>]) -> impl Iterator<Item=&'a Pair<'a, Rule>> + 'a {
        pairs.iter().filter(move |p| p.as_node_tag() == Some(tag))
    }

    fn tagged<'a>(tag: &'a str, pairs: &'a [Pair<'a, Rule>]) -> Result<&'a Pair<'a, Rule>> {
        Self::find_tag(tag, pairs).next().ok_or_else(|| anyhow!("parse error: missing {tag}"))
    }

    fn load_file(&mut self, path: &Path) -> Result<Commands> {
        let canonical = path.canonicalize()
            .with_context(|| format!("cannot open {}", path.display()))?;
        if self.includes.contains(&canonical) {
            Err(anyhow!("include cycle through {}", path.display()))?
        }
        if self.includes.len() >= MAX_INCLUDE_DEPTH {
            Err(anyhow!("includes nested deeper than {MAX_INCLUDE_DEPTH} at {}", path.display()))?
        }
        info!("parsing {}", path.display());
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        self.includes.push(canonical);
        let result = self.load_source(&source, path);
        self.includes.pop();
        result
    }

    fn load_source(&mut self, source: &str, origin: &Path) -> Result<Commands> {
        let parsed = MdlGrammar::parse(Rule::file, source)?
            .next()
            .ok_or_else(|| anyhow!("parse error: empty parse tree"))?;
        let mut commands = Vec::new();
        for statement in parsed.into_inner() {
            self.parse_statement(statement, origin, &mut commands)?;
        }
        Ok(commands)
    }

    fn parse_statement(&mut self, parsed: Pair<Rule>, origin: &Path, commands: &mut Commands) -> Result<()> {
        let line = parsed.line_col().0;
        match parsed.as_rule() {
            Rule::assignment => {
                let inner : Vec<Pair<Rule>> = parsed.into_inner().collect();
                let name = Self::tagged("name", &inner)?.as_str().to_owned();
                let value = self.eval(Self::tagged("value", &inner)?.to_owned())
                    .with_context(|| format!("line {line}"))?;
                self.symbols.add_binding(name, value);
            }
            Rule::include => {
                let inner : Vec<Pair<Rule>> = parsed.into_inner().collect();
                let file = match self.eval(Self::tagged("path", &inner)?.to_owned()).with_context(|| format!("line {line}"))? {
                    Value::String(file) => file,
                    other => Err(anyhow!("line {line}: INCLUDE_FILE expects a string, got {other}"))?,
                };
                let path = origin.parent().unwrap_or(Path::new("")).join(&file);
                debug!("include {}", path.display());
                let included = self.load_file(&path)
                    .with_context(|| format!("line {line}: {}", path.display()))?;
                commands.extend(included);
            }
            Rule::block | Rule::command => commands.push(self.parse_command(parsed)?),
            Rule::EOI => {}
            rule => Err(anyhow!("parse error: unexpected statement {rule:?}"))?,
        }
        Ok(())
    }

    fn parse_command(&self, parsed: Pair<Rule>) -> Result<Command> {
        let rule = parsed.as_rule();
        let mut inner = parsed.into_inner();
        let op = inner.next().ok_or_else(|| anyhow!("parse error: missing operation"))?.as_str().to_owned();
        let mut args = Vec::new();
        let mut body = None;
        for pair in inner {
            if pair.as_rule() == Rule::block_body {
                body = Some(self.parse_block_body(pair)?);
            } else {
                let line = pair.line_col().0;
                args.push(self.parse_arg(pair).with_context(|| format!("line {line}: in {op}"))?);
            }
        }
        Ok(match (rule, body) {
            (Rule::block, Some(body)) => Command::block(op, args, body),
            (Rule::command, None) => Command::new(op, args),
            _ => Err(anyhow!("parse error: malformed {rule:?}"))?,
        })
    }

    fn parse_block_body(&self, parsed: Pair<Rule>) -> Result<Vec<Entry>> {
        parsed.into_inner().map(|entry| -> Result<Entry> {
            Ok(match entry.as_rule() {
                Rule::property => {
                    let line = entry.line_col().0;
                    let inner : Vec<Pair<Rule>> = entry.into_inner().collect();
                    let key = Self::tagged("key", &inner)?.as_str().to_owned();
                    let value = self.eval_property(Self::tagged("value", &inner)?.to_owned())
                        .with_context(|| format!("line {line}: in property {key}"))?;
                    Entry::Property { key, value }
                }
                Rule::block | Rule::command => Entry::Command(self.parse_command(entry)?),
                rule => Err(anyhow!("parse error: unexpected block entry {rule:?}"))?,
            })
        }).collect()
    }

    // bare identifiers stay verbatim in command arguments
    fn parse_arg(&self, parsed: Pair<Rule>) -> Result<Value> {
        match parsed.as_rule() {
            Rule::identifier => Ok(Value::String(parsed.as_str().to_owned())),
            Rule::negative => {
                let number = parsed.into_inner().next().ok_or_else(|| anyhow!("problem parsing negative number"))?;
                builtin::neg(&self.eval(number)?)
            }
            _ => self.eval(parsed),
        }
    }

    // a lone identifier that is not a symbol is a keyword (`SHAPE = SPHERICAL`)
    fn eval_property(&self, parsed: Pair<Rule>) -> Result<Value> {
        if let Some(keyword) = lone_identifier(&parsed) {
            if !self.symbols.contains(keyword.as_str()) {
                return Ok(Value::String(keyword.as_str().to_owned()));
            }
        }
        self.eval(parsed)
    }

    fn eval(&self, parsed: Pair<Rule>) -> Result<Value> {
        Ok(match parsed.as_rule() {
            Rule::integer => Value::Integer(parsed.as_str().parse()
                .with_context(|| format!("integer literal {} out of range", parsed.as_str()))?),
            Rule::float => Value::Float(parsed.as_str().parse()?),
            Rule::string_literal => {
                let inner = parsed.into_inner().next().ok_or(anyhow!("problem parsing string literal"))?;
                Value::String(unescape_string(inner.as_str())?)
            }
            Rule::identifier => self.symbols.get_binding(parsed.as_str()).cloned()
                .ok_or_else(|| anyhow!("undefined symbol {}", parsed.as_str()))?,
            Rule::array => Value::Array(parsed.into_inner().map(|e| self.eval(e)).collect::<Result<Vec<_>>>()?),
            Rule::call => {
                let mut inner = parsed.into_inner();
                let name = inner.next().ok_or(anyhow!("problem parsing function call"))?.as_str().to_owned();
                let args = inner.map(|e| self.eval(e)).collect::<Result<Vec<_>>>()?;
                builtin::call(&name, &args)?
            }
            Rule::expr | Rule::expr_add | Rule::expr_mul => {
                let inner : Vec<Pair<Rule>> = parsed.into_inner().collect();
                if inner.is_empty() || inner.len() % 2 == 0 {
                    Err(anyhow!("parse error: malformed infix expression"))?
                }
                let left = self.eval(inner[0].clone())?;
                inner[1..].chunks_exact(2).try_fold(left, |acc, pair| -> Result<Value> {
                    let right = self.eval(pair[1].clone())?;
                    match pair[0].as_rule() {
                        Rule::concat => builtin::concat(&acc, &right),
                        Rule::add => builtin::add(&acc, &right),
                        Rule::sub => builtin::sub(&acc, &right),
                        Rule::mult => builtin::mul(&acc, &right),
                        Rule::div => builtin::div(&acc, &right),
                        rule => Err(anyhow!("parse error: operator expected, got {rule:?}")),
                    }
                })?
            }
            Rule::expr_prefix => {
                let mut rinner : Vec<Pair<Rule>> = parsed.into_inner().collect();
                rinner.reverse();
                let (operand, ops) = rinner.split_first().ok_or(anyhow!("parse error: empty prefix expression"))?;
                let value = self.eval(operand.clone())?;
                ops.iter().try_fold(value, |acc, _| builtin::neg(&acc))?
            }
            Rule::expr_exp => {
                let inner : Vec<Pair<Rule>> = parsed.into_inner().collect();
                match inner.as_slice() {
                    [base] => self.eval(base.clone())?,
                    [base, _, exponent] => builtin::pow(&self.eval(base.clone())?, &self.eval(exponent.clone())?)?,
                    _ => Err(anyhow!("parse error: malformed exponent"))?,
                }
            }
            rule => Err(anyhow!("parse error: unexpected {rule:?} {}", parsed.as_str()))?,
        })
    }
}

// follows single-child expression levels down to an identifier; a `neg` makes two children
fn lone_identifier<'a>(parsed: &Pair<'a, Rule>) -> Option<Pair<'a, Rule>> {
    let mut pair = parsed.clone();
    loop {
        match pair.as_rule() {
            Rule::identifier => return Some(pair),
            Rule::expr | Rule::expr_add | Rule::expr_mul | Rule::expr_prefix | Rule::expr_exp => {
                let mut inner = pair.into_inner();
                let only = inner.next()?;
                if inner.next().is_some() {
                    return None;
                }
                pair = only;
            }
            _ => return None,
        }
    }
}
