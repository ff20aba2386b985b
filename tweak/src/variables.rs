use crate::core::util::HashMap;
use crate::params::VarId;

#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub name: String,
    pub scope: String,
    pub value: f32,
}

/// Arena of named float variables. Overrides, conditions and command lists
/// refer to entries by [`VarId`]; names are only used at load time.
#[derive(Clone, Debug, Default)]
pub struct Variables {
    entries: Vec<Variable>,
    lookup: HashMap<(String, String), VarId>,
}

impl Variables {
    pub fn declare(&mut self, scope: &str, name: &str, initial: f32) -> VarId {
        let name = strip_sigil(name);
        let key = (scope.to_string(), name.to_string());

        if let Some(&id) = self.lookup.get(&key) {
            self.entries[id.0].value = initial;
            return id;
        }

        let id = VarId(self.entries.len());
        self.entries.push(Variable {
            name: name.to_string(),
            scope: scope.to_string(),
            value: initial,
        });
        self.lookup.insert(key, id);
        id
    }

    /// Looks in `scope` first, then in the global scope.
    pub fn resolve(&self, scope: &str, name: &str) -> Option<VarId> {
        let name = strip_sigil(name);
        self.lookup
            .get(&(scope.to_string(), name.to_string()))
            .or_else(|| self.lookup.get(&(String::new(), name.to_string())))
            .copied()
    }

    pub fn get(&self, id: VarId) -> f32 {
        self.entries.get(id.0).map_or(0.0, |v| v.value)
    }

    pub fn set(&mut self, id: VarId, value: f32) {
        if let Some(entry) = self.entries.get_mut(id.0) {
            entry.value = value;
        }
    }

    pub fn name(&self, id: VarId) -> &str {
        self.entries.get(id.0).map_or("<undeclared>", |v| v.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarId, &Variable)> {
        self.entries.iter().enumerate().map(|(i, v)| (VarId(i), v))
    }
}

fn strip_sigil(name: &str) -> &str {
    name.strip_prefix('$').unwrap_or(name)
}
