use std::cell::RefCell;

use regex_lite::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use crate::arena::ValueArena;
use crate::ast::parser::VariableResolver;
use crate::config::{Config, Derived};
use crate::eval::error::EvalError;
use crate::eval::random::RandomSource;
use crate::eval::{Context, Status};
use crate::value::Value;

/// Name to index table shared by host inputs and derived variables.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    names: Vec<SmolStr>,
    indexes: FxHashMap<SmolStr, usize>,
}

impl Variables {
    /// Registers `name`, returning its index, or `None` if it already exists.
    pub fn declare(&mut self, name: &str) -> Option<usize> {
        if self.indexes.contains_key(name) {
            return None;
        }

        let index = self.names.len();
        let name = SmolStr::new(name);
        self.names.push(name.clone());
        self.indexes.insert(name, index);
        Some(index)
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(SmolStr::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(index, name)| (index, name.as_str()))
    }
}

impl VariableResolver for Variables {
    fn index_of(&self, name: &str) -> Option<usize> {
        self.indexes.get(name).copied()
    }
}

/// One request evaluated against a loaded [`Config`].
///
/// Holds the host inputs and capture groups of the request. Derived variables
/// are computed on demand; a variable that depends on itself resolves as not
/// found.
#[derive(Debug)]
pub struct Request<'c> {
    config: &'c Config,
    inputs: Vec<Option<Vec<u8>>>,
    captures: Vec<Option<Vec<u8>>>,
    evaluating: RefCell<FxHashSet<usize>>,
}

impl<'c> Request<'c> {
    pub fn new(config: &'c Config) -> Self {
        Self {
            config,
            inputs: vec![None; config.variables().len()],
            captures: Vec::new(),
            evaluating: RefCell::new(FxHashSet::default()),
        }
    }

    /// Sets a host input. Returns `false` if `name` is unknown or derived.
    pub fn set_input(&mut self, name: &str, value: impl Into<Vec<u8>>) -> bool {
        match self.config.variables().index_of(name) {
            Some(index) if self.config.definition(index).is_none() => {
                self.inputs[index] = Some(value.into());
                true
            }
            _ => false,
        }
    }

    pub fn set_captures(&mut self, captures: Vec<Option<Vec<u8>>>) {
        self.captures = captures;
    }

    /// Matches `pattern` against `subject` and stores the capture groups,
    /// group 0 being the whole match. Returns whether the pattern matched.
    pub fn match_captures(
        &mut self,
        pattern: &str,
        subject: &str,
    ) -> Result<bool, regex_lite::Error> {
        let re = Regex::new(pattern)?;

        self.captures = match re.captures(subject) {
            Some(caps) => caps
                .iter()
                .map(|group| group.map(|m| m.as_str().as_bytes().to_vec()))
                .collect(),
            None => Vec::new(),
        };

        log::trace!("{} capture group(s) from {:?}", self.captures.len(), pattern);
        Ok(!self.captures.is_empty())
    }

    /// Evaluates `name` in a fresh arena.
    pub fn get(&self, name: &str) -> (Vec<u8>, Status) {
        let Some(index) = self.config.variables().index_of(name) else {
            log::debug!("Unknown variable ${}", name);
            return (Vec::new(), Status::NotFound);
        };

        let mut arena = ValueArena::default();
        let result = match self.config.definition(index) {
            Some(derived) => self.eval_derived(index, derived, &mut arena),
            None => self.input(index),
        };

        match result {
            Ok(value) => {
                log::trace!(
                    "${}: {} buffer(s), {} byte(s) allocated",
                    name,
                    arena.len(),
                    arena.allocated_bytes()
                );
                (value.to_vec(&arena), Status::Ok)
            }
            Err(err) => {
                log::debug!("${} has no value: {}", name, err);
                (Vec::new(), err.status())
            }
        }
    }

    fn input(&self, index: usize) -> Result<Value<'_>, EvalError> {
        self.inputs
            .get(index)
            .and_then(|value| value.as_deref())
            .map(Value::Borrowed)
            .ok_or_else(|| self.not_found(index))
    }

    fn eval_derived<'a>(
        &'a self,
        index: usize,
        derived: &'a Derived,
        arena: &mut ValueArena,
    ) -> Result<Value<'a>, EvalError> {
        if !self.evaluating.borrow_mut().insert(index) {
            log::debug!("${} refers to itself", self.name(index));
            return Err(self.not_found(index));
        }

        let result = derived.evaluate(self, arena);
        self.evaluating.borrow_mut().remove(&index);
        result
    }

    fn name(&self, index: usize) -> &str {
        self.config.variables().name(index).unwrap_or_default()
    }

    fn not_found(&self, index: usize) -> EvalError {
        EvalError::VariableNotFound(index, SmolStr::new(self.name(index)))
    }
}

impl Context for Request<'_> {
    fn variable<'a>(&'a self, index: usize, arena: &mut ValueArena) -> Option<Value<'a>> {
        let result = match self.config.definition(index) {
            Some(derived) => self.eval_derived(index, derived, arena),
            None => self.input(index),
        };

        result
            .inspect_err(|err| log::trace!("${}: {}", self.name(index), err))
            .ok()
    }

    fn capture(&self, index: usize) -> Option<&[u8]> {
        self.captures.get(index).and_then(|c| c.as_deref())
    }

    fn random(&self) -> &dyn RandomSource {
        self.config.random()
    }
}
