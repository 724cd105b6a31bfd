use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

pub(crate) type ScopeRef = Rc<RefCell<Scope>>;

struct Binding {
    /// `None` until a `let`/`const` declaration runs.
    value: Option<Value>,
    mutable: bool,
}

/// One lexical environment.
#[derive(Default)]
pub(crate) struct Scope {
    vars: HashMap<String, Binding>,
    parent: Option<ScopeRef>,
}

pub(crate) enum Lookup {
    Found(Value),
    Uninitialized,
    Missing,
}

pub(crate) enum AssignError {
    Missing,
    Constant,
    Uninitialized,
}

impl Scope {
    pub(crate) fn root() -> ScopeRef {
        Rc::new(RefCell::new(Self::default()))
    }

    pub(crate) fn child(parent: &ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Self {
            vars: HashMap::new(),
            parent: Some(Rc::clone(parent)),
        }))
    }

    pub(crate) fn declare(&mut self, name: &str, value: Option<Value>, mutable: bool) {
        self.vars
            .insert(name.to_owned(), Binding { value, mutable });
    }

    pub(crate) fn has_own(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Copy an own binding into `target`; used for per-iteration loop scopes.
    pub(crate) fn copy_binding(&self, name: &str, target: &mut Scope) {
        if let Some(binding) = self.vars.get(name) {
            target.declare(name, binding.value.clone(), binding.mutable);
        }
    }
}

pub(crate) fn lookup(scope: &ScopeRef, name: &str) -> Lookup {
    let mut current = Some(Rc::clone(scope));
    while let Some(env) = current {
        let env = env.borrow();
        if let Some(binding) = env.vars.get(name) {
            return match &binding.value {
                Some(value) => Lookup::Found(value.clone()),
                None => Lookup::Uninitialized,
            };
        }
        current = env.parent.clone();
    }
    Lookup::Missing
}

pub(crate) fn assign(scope: &ScopeRef, name: &str, value: Value) -> Result<(), AssignError> {
    let mut current = Some(Rc::clone(scope));
    while let Some(env) = current {
        let mut env = env.borrow_mut();
        if let Some(binding) = env.vars.get_mut(name) {
            if binding.value.is_none() {
                return Err(AssignError::Uninitialized);
            }
            if !binding.mutable {
                return Err(AssignError::Constant);
            }
            binding.value = Some(value);
            return Ok(());
        }
        current = env.parent.clone();
    }
    Err(AssignError::Missing)
}
