//! Dedup keys
//!
//! Keys are stored in the checkpoint as strings. `ItemKey` turns a typed key
//! into that canonical string; the encoding must be deterministic and
//! injective for a given key type so that the same logical item always maps
//! to the same checkpoint entry.

use crate::types::JsonValue;
use serde::Serialize;

/// A value usable as a dedup key
pub trait ItemKey {
    /// Canonical string form stored in the checkpoint
    fn encode(&self) -> String;
}

impl ItemKey for str {
    fn encode(&self) -> String {
        self.to_string()
    }
}

impl ItemKey for String {
    fn encode(&self) -> String {
        self.clone()
    }
}

impl<T: ItemKey + ?Sized> ItemKey for &T {
    fn encode(&self) -> String {
        (**self).encode()
    }
}

impl ItemKey for JsonValue {
    fn encode(&self) -> String {
        self.to_string()
    }
}

macro_rules! display_key {
    ($($t:ty),*) => {
        $(
            impl ItemKey for $t {
                fn encode(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

display_key!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, bool, char);

// Tuples encode as a JSON array so `("a,b", 1)` and `("a", "b,1")` stay distinct.
macro_rules! tuple_key {
    ($($name:ident),+) => {
        impl<$($name: Serialize),+> ItemKey for ($($name,)+) {
            fn encode(&self) -> String {
                serde_json::to_string(self).unwrap_or_default()
            }
        }
    };
}

tuple_key!(A, B);
tuple_key!(A, B, C);
tuple_key!(A, B, C, D);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_keys() {
        assert_eq!("abc".encode(), "abc");
        assert_eq!(String::from("abc").encode(), "abc");
        assert_eq!(42u32.encode(), "42");
        assert_eq!((-7i64).encode(), "-7");
        assert_eq!(true.encode(), "true");
    }

    #[test]
    fn test_tuple_keys_are_unambiguous() {
        let a = ("a,b", 1).encode();
        let b = ("a", "b,1").encode();
        assert_eq!(a, r#"["a,b",1]"#);
        assert_ne!(a, b);
        assert_eq!(("boston", 2024, "f").encode(), r#"["boston",2024,"f"]"#);
    }

    #[test]
    fn test_json_key_is_deterministic() {
        let v = json!({"name": "x", "age": 30});
        assert_eq!(v.encode(), v.clone().encode());
    }
}
