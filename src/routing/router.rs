//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up the handler for a method + path
//! - Distinguish "no such path" from "path exists, wrong method"
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - One radix tree over paths; methods hang off each path slot
//! - OPTIONS is answered for every registered path and cannot be registered

use std::collections::HashMap;

use axum::http::Method;

use crate::http::handler::{BoxedHandler, Handler};
use crate::routing::pattern::{Captures, RoutePattern};
use crate::routing::RouteError;

struct RouteSlot {
    pattern: RoutePattern,
    handlers: HashMap<Method, BoxedHandler>,
}

/// Outcome of a route lookup.
pub enum Lookup {
    Found {
        handler: BoxedHandler,
        captures: Captures,
    },
    /// OPTIONS on a registered path.
    Preflight,
    MethodNotAllowed,
    NotFound,
}

impl std::fmt::Debug for Lookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lookup::Found { captures, .. } => f.debug_struct("Found").field("captures", captures).finish(),
            Lookup::Preflight => f.write_str("Preflight"),
            Lookup::MethodNotAllowed => f.write_str("MethodNotAllowed"),
            Lookup::NotFound => f.write_str("NotFound"),
        }
    }
}

/// Immutable routing table.
pub struct RouteTable {
    tree: matchit::Router<usize>,
    slots: Vec<RouteSlot>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    pub fn lookup(&self, method: &Method, path: &str) -> Lookup {
        let Ok(matched) = self.tree.at(path) else {
            return Lookup::NotFound;
        };
        let slot = &self.slots[*matched.value];
        let Some(captures) = slot.pattern.captures(&matched.params) else {
            return Lookup::NotFound;
        };

        if method == Method::OPTIONS {
            return Lookup::Preflight;
        }

        match slot.handlers.get(method) {
            Some(handler) => Lookup::Found {
                handler: handler.clone(),
                captures,
            },
            None => Lookup::MethodNotAllowed,
        }
    }

    /// Every registered (method, pattern) pair.
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.slots
            .iter()
            .flat_map(|slot| slot.handlers.keys().map(move |m| (m, slot.pattern.as_str())))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().map(|slot| slot.handlers.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Collects routes and freezes them into a [`RouteTable`].
#[derive(Default)]
pub struct RouteTableBuilder {
    tree: matchit::Router<usize>,
    slots: Vec<RouteSlot>,
    by_pattern: HashMap<String, usize>,
}

impl RouteTableBuilder {
    /// Register a handler for a method + pattern pair. Returns `self` for chaining.
    pub fn route(self, method: Method, pattern: &str, handler: impl Handler) -> Result<Self, RouteError> {
        self.route_boxed(method, pattern, handler.into_boxed_handler())
    }

    pub fn route_boxed(mut self, method: Method, pattern: &str, handler: BoxedHandler) -> Result<Self, RouteError> {
        if method == Method::OPTIONS {
            return Err(RouteError::ReservedMethod(pattern.to_string()));
        }

        let index = match self.by_pattern.get(pattern) {
            Some(&index) => index,
            None => {
                let parsed = RoutePattern::parse(pattern)?;
                let index = self.slots.len();
                let conflict = |e: matchit::InsertError| RouteError::Conflict {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                };
                self.tree.insert(parsed.tree_path(), index).map_err(conflict)?;
                if let Some(empty) = parsed.empty_tail_path() {
                    self.tree.insert(empty, index).map_err(conflict)?;
                }
                self.slots.push(RouteSlot {
                    pattern: parsed,
                    handlers: HashMap::new(),
                });
                self.by_pattern.insert(pattern.to_string(), index);
                index
            }
        };

        let slot = &mut self.slots[index];
        if slot.handlers.contains_key(&method) {
            return Err(RouteError::Duplicate {
                method,
                pattern: pattern.to_string(),
            });
        }

        tracing::info!(method = %method, route = %pattern, "Registering route");
        slot.handlers.insert(method, handler);
        Ok(self)
    }

    pub fn build(self) -> RouteTable {
        RouteTable {
            tree: self.tree,
            slots: self.slots,
        }
    }
}
