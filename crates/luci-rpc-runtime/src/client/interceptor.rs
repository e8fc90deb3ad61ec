use std::sync::Arc;

use serde_json::{Map, Value};

/// Identifies the call a reply belongs to.
#[derive(Debug, Clone, Copy)]
pub struct CallInfo<'a> {
    pub id: u64,
    pub object: &'a str,
    pub method: &'a str,
    pub params: &'a Map<String, Value>,
}

/// Hook observing every raw call reply before it is validated.
///
/// Returning `Err` rejects that call with the given message.
pub type InterceptorFn =
    Arc<dyn Fn(&Value, &CallInfo<'_>) -> std::result::Result<(), String> + Send + Sync>;

/// Handle returned by `add_interceptor`, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptorId(pub(crate) u64);

/// Ordered set of interceptors.
#[derive(Clone, Default)]
pub(crate) struct Interceptors {
    next_id: u64,
    entries: Vec<(InterceptorId, InterceptorFn)>,
}

impl Interceptors {
    pub(crate) fn add<F>(&mut self, f: F) -> InterceptorId
    where
        F: Fn(&Value, &CallInfo<'_>) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.next_id += 1;
        let id = InterceptorId(self.next_id);
        self.entries.push((id, Arc::new(f)));
        id
    }

    pub(crate) fn remove(&mut self, id: InterceptorId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() < before
    }

    pub(crate) fn snapshot(&self) -> Vec<InterceptorFn> {
        self.entries.iter().map(|(_, f)| Arc::clone(f)).collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_remove() {
        let mut interceptors = Interceptors::default();
        let a = interceptors.add(|_, _| Ok(()));
        let b = interceptors.add(|_, _| Err("nope".to_string()));
        assert_ne!(a, b);
        assert_eq!(interceptors.len(), 2);

        assert!(interceptors.remove(a));
        assert!(!interceptors.remove(a));
        assert_eq!(interceptors.snapshot().len(), 1);
    }
}
