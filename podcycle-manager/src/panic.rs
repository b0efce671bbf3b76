//! Panic payload rendering

use std::any::Any;

/// Human-readable message carried by a panic payload
pub fn describe(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_payloads() {
        assert_eq!(describe(&"static message"), "static message");
        assert_eq!(describe(&format!("formatted {}", 1)), "formatted 1");
        assert_eq!(describe(&42u32), "unknown panic");
    }
}
