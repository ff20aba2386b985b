//! Addressing for every scalar an override can touch.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

/// Indexed parameters above this are almost certainly typos.
pub const MAX_PARAM_INDEX: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Component {
    X,
    Y,
    Z,
    W,
}

impl Component {
    pub fn as_char(&self) -> char {
        match self {
            Self::X => 'x',
            Self::Y => 'y',
            Self::Z => 'z',
            Self::W => 'w',
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
            Self::W => 3,
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'x' => Some(Self::X),
            'y' => Some(Self::Y),
            'z' => Some(Self::Z),
            'w' => Some(Self::W),
            _ => None,
        }
    }
}

/// One component of the indexed float-vector table, written `x`, `y3`,
/// `w12`. Index 0 has no digits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParamSlot {
    pub index: usize,
    pub component: Component,
}

impl ParamSlot {
    pub fn new(index: usize, component: Component) -> Self {
        Self { index, component }
    }
}

impl fmt::Display for ParamSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.index == 0 {
            write!(f, "{}", self.component.as_char())
        } else {
            write!(f, "{}{}", self.component.as_char(), self.index)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamSlotError {
    NotAParam,
    IndexOutOfRange(usize),
}

impl fmt::Display for ParamSlotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAParam => write!(f, "not an indexed parameter name"),
            Self::IndexOutOfRange(index) => write!(
                f,
                "parameter index {} exceeds the maximum of {}",
                index,
                MAX_PARAM_INDEX - 1
            ),
        }
    }
}

impl std::error::Error for ParamSlotError {}

impl FromStr for ParamSlot {
    type Err = ParamSlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let component = chars
            .next()
            .and_then(Component::from_char)
            .ok_or(ParamSlotError::NotAParam)?;
        let digits = chars.as_str();

        if digits.is_empty() {
            return Ok(Self::new(0, component));
        }

        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParamSlotError::NotAParam);
        }

        let index = digits
            .parse::<usize>()
            .map_err(|_| ParamSlotError::IndexOutOfRange(usize::MAX))?;

        if index >= MAX_PARAM_INDEX {
            return Err(ParamSlotError::IndexOutOfRange(index));
        }

        Ok(Self::new(index, component))
    }
}

/// Handle into [`crate::variables::Variables`]. Identity is the handle, not
/// the name, so equally named variables in different scopes never collide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub(crate) usize);

impl VarId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParameterKey {
    Separation,
    Convergence,
    Indexed(ParamSlot),
    Var(VarId),
}

impl fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Separation => write!(f, "separation"),
            Self::Convergence => write!(f, "convergence"),
            Self::Indexed(slot) => write!(f, "{}", slot),
            Self::Var(id) => write!(f, "var#{}", id.0),
        }
    }
}

/// A sparse set of parameter values. Only the keys present are ever touched,
/// which is how an override leaves everything it does not configure alone.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamValues {
    pub separation: Option<f32>,
    pub convergence: Option<f32>,
    pub params: IndexMap<ParamSlot, f32>,
    pub vars: IndexMap<VarId, f32>,
}

impl ParamValues {
    pub fn is_empty(&self) -> bool {
        self.separation.is_none()
            && self.convergence.is_none()
            && self.params.is_empty()
            && self.vars.is_empty()
    }

    pub fn get(&self, key: ParameterKey) -> Option<f32> {
        match key {
            ParameterKey::Separation => self.separation,
            ParameterKey::Convergence => self.convergence,
            ParameterKey::Indexed(slot) => self.params.get(&slot).copied(),
            ParameterKey::Var(id) => self.vars.get(&id).copied(),
        }
    }

    pub fn set(&mut self, key: ParameterKey, value: f32) {
        match key {
            ParameterKey::Separation => self.separation = Some(value),
            ParameterKey::Convergence => self.convergence = Some(value),
            ParameterKey::Indexed(slot) => {
                self.params.insert(slot, value);
            }
            ParameterKey::Var(id) => {
                self.vars.insert(id, value);
            }
        }
    }

    pub fn remove(&mut self, key: ParameterKey) {
        match key {
            ParameterKey::Separation => self.separation = None,
            ParameterKey::Convergence => self.convergence = None,
            ParameterKey::Indexed(slot) => {
                self.params.shift_remove(&slot);
            }
            ParameterKey::Var(id) => {
                self.vars.shift_remove(&id);
            }
        }
    }

    /// Every key with a value, in declaration order after the two fixed
    /// slots.
    pub fn keys(&self) -> Vec<ParameterKey> {
        let mut keys =
            Vec::with_capacity(2 + self.params.len() + self.vars.len());
        if self.separation.is_some() {
            keys.push(ParameterKey::Separation);
        }
        if self.convergence.is_some() {
            keys.push(ParameterKey::Convergence);
        }
        keys.extend(self.params.keys().map(|s| ParameterKey::Indexed(*s)));
        keys.extend(self.vars.keys().map(|v| ParameterKey::Var(*v)));
        keys
    }

    /// Highest indexed parameter referenced, plus one.
    pub fn reserved_params(&self) -> usize {
        self.params.keys().map(|s| s.index + 1).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_slot_names() {
        let parse = |s: &str| s.parse::<ParamSlot>();
        assert_eq!(parse("x"), Ok(ParamSlot::new(0, Component::X)));
        assert_eq!(parse("W"), Ok(ParamSlot::new(0, Component::W)));
        assert_eq!(parse("y3"), Ok(ParamSlot::new(3, Component::Y)));
        assert_eq!(parse("z120"), Ok(ParamSlot::new(120, Component::Z)));
    }

    #[test]
    fn rejects_non_slot_names() {
        for name in ["", "separation", "x1a", "q1", "$x", "x-1"] {
            assert_eq!(
                name.parse::<ParamSlot>(),
                Err(ParamSlotError::NotAParam),
                "{name}"
            );
        }
        assert_eq!(
            "x4096".parse::<ParamSlot>(),
            Err(ParamSlotError::IndexOutOfRange(4096))
        );
    }

    #[test]
    fn display_omits_index_zero() {
        assert_eq!(ParamSlot::new(0, Component::X).to_string(), "x");
        assert_eq!(ParamSlot::new(7, Component::W).to_string(), "w7");
    }

    #[test]
    fn slots_order_by_index_then_component() {
        let mut slots = vec![
            ParamSlot::new(1, Component::X),
            ParamSlot::new(0, Component::W),
            ParamSlot::new(0, Component::X),
        ];
        slots.sort();
        assert_eq!(
            slots,
            vec![
                ParamSlot::new(0, Component::X),
                ParamSlot::new(0, Component::W),
                ParamSlot::new(1, Component::X),
            ]
        );
    }

    #[test]
    fn keys_lists_only_present_values() {
        let mut values = ParamValues::default();
        assert!(values.is_empty());

        values.convergence = Some(1.0);
        values.params.insert(ParamSlot::new(2, Component::Y), 0.5);

        assert_eq!(
            values.keys(),
            vec![
                ParameterKey::Convergence,
                ParameterKey::Indexed(ParamSlot::new(2, Component::Y)),
            ]
        );
        assert_eq!(values.reserved_params(), 3);
    }
}
