mod activation;
mod actors;
mod closure;
mod error;
mod fragment;
mod heap;
mod interning;
mod lookup;
mod meta;
mod method;
mod mirage;
mod mirror;
mod object;
mod primitives;
mod selector;
mod slots;
mod value;
mod visitor;
mod vm;

pub use activation::CallFrame;
pub use actors::*;
pub use closure::{Closure, Context};
pub use error::*;
pub use fragment::*;
pub use heap::{GarbageCollectionStats, Heap, HeapObject, HeapSettings, ObjectId};
pub use interning::Symbol;
pub use lookup::{LookupResult, Slot};
pub use meta::{META_OPERATIONS, MetaOp, MetaOperation};
pub use method::*;
pub use mirage::Mirage;
pub use object::*;
pub use primitives::{PRIMITIVES, PrimitiveFunction, PrimitiveMessage};
pub use selector::*;
pub use slots::*;
pub use value::{TypeTag, Value};
pub use visitor::{Visitable, Visitor};
pub use vm::*;
