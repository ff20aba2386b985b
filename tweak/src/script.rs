//! Conditions gate activation and command lists are the side effects an
//! override runs on activate/deactivate. Both are opaque to the engine; this
//! module also carries the small expression language the YAML surface uses
//! for `condition` and the registry `run` names resolve against.
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::core::util::HashMap;
use crate::params::VarId;
use crate::variables::Variables;

/// Zero means "not met".
pub trait Condition {
    fn evaluate(&self, variables: &Variables) -> f32;
}

impl<F> Condition for F
where
    F: Fn(&Variables) -> f32,
{
    fn evaluate(&self, variables: &Variables) -> f32 {
        self(variables)
    }
}

pub trait CommandList {
    fn run(&self, variables: &mut Variables);
}

impl<F> CommandList for F
where
    F: Fn(&mut Variables),
{
    fn run(&self, variables: &mut Variables) {
        self(variables)
    }
}

#[derive(Clone)]
pub struct RunCommand {
    pub activate: Arc<dyn CommandList>,
    pub deactivate: Option<Arc<dyn CommandList>>,
}

impl fmt::Debug for RunCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunCommand")
            .field("activate", &"<command list>")
            .field(
                "deactivate",
                &self.deactivate.as_ref().map(|_| "<command list>"),
            )
            .finish()
    }
}

/// Named command lists that `run: <name>` can refer to.
#[derive(Clone, Debug, Default)]
pub struct CommandLists {
    entries: HashMap<String, RunCommand>,
}

impl CommandLists {
    pub fn register<A>(&mut self, name: &str, activate: A)
    where
        A: CommandList + 'static,
    {
        self.entries.insert(
            name.to_string(),
            RunCommand {
                activate: Arc::new(activate),
                deactivate: None,
            },
        );
    }

    /// Registers a list whose second half runs when the override is released.
    pub fn register_pair<A, D>(
        &mut self,
        name: &str,
        activate: A,
        deactivate: D,
    ) where
        A: CommandList + 'static,
        D: CommandList + 'static,
    {
        self.entries.insert(
            name.to_string(),
            RunCommand {
                activate: Arc::new(activate),
                deactivate: Some(Arc::new(deactivate)),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<RunCommand> {
        self.entries.get(name.trim()).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name.trim())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    Empty,
    UndeclaredVariable(String),
    InvalidTerm(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty expression"),
            Self::UndeclaredVariable(name) => {
                write!(f, "undeclared variable {}", name)
            }
            Self::InvalidTerm(term) => write!(f, "invalid term \"{}\"", term),
        }
    }
}

impl Error for ParseError {}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Operand {
    Const(f32),
    Var(VarId),
}

impl Operand {
    fn value(&self, variables: &Variables) -> f32 {
        match self {
            Self::Const(v) => *v,
            Self::Var(id) => variables.get(*id),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    // Two-character operators first so `<=` is not read as `<`.
    const TOKENS: [(&'static str, CompareOp); 6] = [
        ("==", CompareOp::Eq),
        ("!=", CompareOp::Ne),
        ("<=", CompareOp::Le),
        (">=", CompareOp::Ge),
        ("<", CompareOp::Lt),
        (">", CompareOp::Gt),
    ];

    fn apply(&self, a: f32, b: f32) -> bool {
        match self {
            Self::Eq => a == b,
            Self::Ne => a != b,
            Self::Lt => a < b,
            Self::Le => a <= b,
            Self::Gt => a > b,
            Self::Ge => a >= b,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Node {
    Any(Vec<Node>),
    All(Vec<Node>),
    Not(Box<Node>),
    Compare(Operand, CompareOp, Operand),
    Truthy(Operand),
}

impl Node {
    fn eval(&self, variables: &Variables) -> bool {
        match self {
            Self::Any(nodes) => nodes.iter().any(|n| n.eval(variables)),
            Self::All(nodes) => nodes.iter().all(|n| n.eval(variables)),
            Self::Not(node) => !node.eval(variables),
            Self::Compare(a, op, b) => {
                op.apply(a.value(variables), b.value(variables))
            }
            Self::Truthy(operand) => operand.value(variables) != 0.0,
        }
    }
}

/// Parsed condition, e.g. `$mode == 2 and not $menu_open or $force`.
/// `and` binds tighter than `or`; there are no parentheses.
#[derive(Clone, Debug, PartialEq)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    pub fn parse(
        source: &str,
        scope: &str,
        variables: &Variables,
    ) -> Result<Self, ParseError> {
        if source.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let mut any = Vec::new();
        for or_term in source.split(" or ") {
            let mut all = Vec::new();
            for and_term in or_term.split(" and ") {
                all.push(parse_term(and_term, scope, variables)?);
            }
            any.push(if all.len() == 1 {
                all.remove(0)
            } else {
                Node::All(all)
            });
        }

        let root = if any.len() == 1 {
            any.remove(0)
        } else {
            Node::Any(any)
        };

        Ok(Self {
            source: source.trim().to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Condition for Expression {
    fn evaluate(&self, variables: &Variables) -> f32 {
        if self.root.eval(variables) { 1.0 } else { 0.0 }
    }
}

fn parse_term(
    term: &str,
    scope: &str,
    variables: &Variables,
) -> Result<Node, ParseError> {
    let term = term.trim();

    if term.is_empty() {
        return Err(ParseError::Empty);
    }

    if let Some(inner) = term.strip_prefix("not ") {
        let inner = parse_term(inner, scope, variables)?;
        return Ok(Node::Not(Box::new(inner)));
    }

    for (token, op) in CompareOp::TOKENS {
        if let Some((lhs, rhs)) = term.split_once(token) {
            let lhs = parse_operand(lhs, scope, variables)?;
            let rhs = parse_operand(rhs, scope, variables)?;
            return Ok(Node::Compare(lhs, op, rhs));
        }
    }

    Ok(Node::Truthy(parse_operand(term, scope, variables)?))
}

fn parse_operand(
    operand: &str,
    scope: &str,
    variables: &Variables,
) -> Result<Operand, ParseError> {
    let operand = operand.trim();

    if operand.eq_ignore_ascii_case("true") {
        return Ok(Operand::Const(1.0));
    }
    if operand.eq_ignore_ascii_case("false") {
        return Ok(Operand::Const(0.0));
    }

    if operand.starts_with('$') {
        return variables
            .resolve(scope, operand)
            .map(Operand::Var)
            .ok_or_else(|| {
                ParseError::UndeclaredVariable(operand.to_string())
            });
    }

    operand
        .parse::<f32>()
        .map(Operand::Const)
        .map_err(|_| ParseError::InvalidTerm(operand.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> (Variables, VarId, VarId) {
        let mut vars = Variables::default();
        let mode = vars.declare("", "mode", 2.0);
        let menu = vars.declare("", "menu", 0.0);
        (vars, mode, menu)
    }

    #[test]
    fn comparisons_and_truthiness() {
        let (mut vars, _, menu) = vars();
        let e = Expression::parse("$mode == 2 and not $menu", "", &vars)
            .unwrap();
        assert_eq!(e.evaluate(&vars), 1.0);

        vars.set(menu, 1.0);
        assert_eq!(e.evaluate(&vars), 0.0);
    }

    #[test]
    fn or_binds_looser_than_and() {
        let (vars, _, _) = vars();
        let e = Expression::parse("$menu and false or $mode >= 2", "", &vars)
            .unwrap();
        assert_eq!(e.evaluate(&vars), 1.0);

        let e = Expression::parse("$mode < 2 or $menu", "", &vars).unwrap();
        assert_eq!(e.evaluate(&vars), 0.0);
    }

    #[test]
    fn undeclared_variables_fail_to_parse() {
        let (vars, _, _) = vars();
        assert_eq!(
            Expression::parse("$nope == 1", "", &vars),
            Err(ParseError::UndeclaredVariable("$nope".to_string()))
        );
        assert_eq!(Expression::parse("  ", "", &vars), Err(ParseError::Empty));
        assert!(matches!(
            Expression::parse("$mode == banana", "", &vars),
            Err(ParseError::InvalidTerm(_))
        ));
    }

    #[test]
    fn registry_resolves_trimmed_names() {
        let mut lists = CommandLists::default();
        lists.register_pair(
            "CommandListAim",
            |v: &mut Variables| {
                let id = v.declare("", "aim", 0.0);
                v.set(id, 1.0);
            },
            |v: &mut Variables| {
                let id = v.declare("", "aim", 0.0);
                v.set(id, 0.0);
            },
        );

        let run = lists.get(" CommandListAim ").unwrap();
        let mut vars = Variables::default();
        run.activate.run(&mut vars);
        assert_eq!(vars.get(vars.resolve("", "aim").unwrap()), 1.0);
        assert!(run.deactivate.is_some());
        assert!(!lists.has("CommandListOther"));
    }
}
