//! onboarding-dsl: S-expression codec for onboarding requests.
//!
//! A textual format describes an onboarding request — entities, resources,
//! workflow steps, lifecycle states — and this crate converts between that
//! text and a typed in-memory document:
//!
//! ```text
//! text ──tokenizer──> tokens ──generic parser──> tree ──mapper──> Request
//! Request ──canonical printer──> text
//! ```
//!
//! All four stages are synchronous pure functions over in-memory data; no
//! I/O, no shared state, safe to call from any number of threads. Callers
//! use [`parse`] and [`print`] and never need to reach into tokenizer or
//! tree internals. Storage and generation live behind the
//! [`DocumentStore`] boundary in the surrounding system.
//!
//! ```
//! use onboarding_dsl::{parse, print};
//!
//! let text = r#"(onboarding-request
//!   (:meta (request-id "r1") (version 1))
//!   (:orchestrator
//!     (:lifecycle (states draft active) (initial draft) (transitions))
//!     (:entities
//!       (entity :id "e1" :type LegalEntity (attrs (name "Acme"))))))"#;
//!
//! let doc = parse(text)?;
//! assert_eq!(doc.meta.request_id, "r1");
//!
//! let canonical = print(&doc);
//! assert_eq!(parse(&canonical)?, doc);
//! # Ok::<(), onboarding_dsl::ParseError>(())
//! ```

pub mod ast;
pub mod error;
pub mod grammar;
pub mod hash;
pub mod mapper;
pub mod printer;
pub mod sexpr;
pub mod store;
pub mod token;

// Re-export commonly used types
pub use ast::{
    ActionCall, ActionDef, AttrDef, AttrVal, Catalog, Entity, Expr, Flow, Fork, Gate, Join,
    Lifecycle, Meta, Orchestrator, ParamDef, Policy, Request, Resource, RequireItem, Step, Task,
    Transition, Value,
};
pub use error::{LexError, MappingError, ParseError, SyntaxError};
pub use grammar::GRAMMAR;
pub use hash::content_hash;
pub use printer::print;
pub use sexpr::{parse_text, Atom, Sexpr};
pub use store::{DocumentStore, StoreError};
pub use token::{tokenize, Position, Token, TokenKind};

/// Parse onboarding-request text into a typed document.
pub fn parse(text: &str) -> Result<Request, ParseError> {
    let tokens = token::tokenize(text)?;
    let tree = sexpr::parse_tokens(&tokens)?;
    Ok(mapper::map(&tree)?)
}
