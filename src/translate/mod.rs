mod class;
mod complexity;
mod env;
mod errors;
mod expressions;
mod items;
mod method;
mod normalize;
mod session;
mod settings;
mod statements;
mod switch;

pub use class::*;
pub use complexity::complexity;
pub use errors::*;
pub use items::{CondItem, Item, Items, Member, MemberRef};
pub use method::{MethodTranslator, MAX_DIMENSIONS, MAX_PARAMETERS, MAX_STRING_LENGTH};
pub use normalize::normalize_class;
pub use session::*;
pub use settings::*;
pub use switch::switch_opcode;
