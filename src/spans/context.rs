//! Capture-group registry for one query execution.

/// Maps capture group names to slot indexes.
///
/// Created per (query, segment) execution and threaded by `&mut` through
/// [`Spans::set_context`](super::Spans::set_context). Registering a name that
/// already exists returns its existing slot.
#[derive(Debug, Clone, Default)]
pub struct HitQueryContext {
    names: Vec<String>,
    registrations: usize,
}

impl HitQueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with slots pre-assigned in the given order
    pub fn with_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut context = Self::new();
        for name in names {
            let name = name.into();
            if !context.names.contains(&name) {
                context.names.push(name);
            }
        }
        context
    }

    pub fn register(&mut self, name: &str) -> usize {
        self.registrations += 1;
        match self.slot(name) {
            Some(slot) => slot,
            None => {
                self.names.push(name.to_string());
                self.names.len() - 1
            }
        }
    }

    pub fn slot(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn num_groups(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of `register` calls so far; a combinator compares this before and
    /// after forwarding `set_context` to learn whether anything below it captures.
    pub fn registrations(&self) -> usize {
        self.registrations
    }
}
