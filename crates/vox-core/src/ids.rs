//! Opaque id generation. Every id the core hands out is a random UUID
//! rendered as a string; callers must treat them as opaque.

use uuid::Uuid;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
