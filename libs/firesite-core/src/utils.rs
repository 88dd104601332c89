use chrono::Utc;
use rand::{thread_rng, Rng};

/// 32 lowercase hex chars from 16 random bytes.
pub fn uuid() -> String {
    let bytes: [u8; 16] = thread_rng().gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Seconds since epoch with millisecond precision.
pub fn now() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Trims, lowercases, turns spaces into `_` and drops parentheses.
pub fn slugify(text: &str) -> String {
    text.trim()
        .replace(' ', "_")
        .to_lowercase()
        .replace(['(', ')'], "")
}

/// `docs__intro` -> `/docs/intro`
pub fn page_id_to_path(id: &str) -> String {
    format!("/{}", id.replace("__", "/"))
}

/// `/docs/intro` -> `docs__intro`
pub fn page_path_to_id(path: &str) -> String {
    path.strip_prefix('/').unwrap_or(path).replace('/', "__")
}

/// Human readable size, rounded to whole bytes, KB or MB.
pub fn file_size_str(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} bytes");
    }
    let kb = (bytes as f64 / 1024.0).round();
    if kb < 1024.0 {
        return format!("{kb} KB");
    }
    format!("{} MB", (kb / 1024.0).round())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_is_random_hex() {
        let (a, b) = (uuid(), uuid());
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, b);
    }

    #[test]
    fn now_is_seconds() {
        let now = now();
        assert!(now > 1_600_000_000.0 && now < 10_000_000_000.0);
    }

    #[test]
    fn slugs() {
        assert_eq!(slugify(" Getting Started "), "getting_started");
        assert_eq!(slugify("Notes (Draft)"), "notes_draft");
    }

    #[test]
    fn page_paths() {
        assert_eq!(page_id_to_path("docs__intro"), "/docs/intro");
        assert_eq!(page_id_to_path("home"), "/home");
        assert_eq!(page_path_to_id("/docs/intro"), "docs__intro");
        assert_eq!(page_path_to_id("docs/intro"), "docs__intro");
        assert_eq!(page_path_to_id(&page_id_to_path("a__b__c")), "a__b__c");
    }

    #[test]
    fn file_sizes() {
        assert_eq!(file_size_str(512), "512 bytes");
        assert_eq!(file_size_str(1536), "2 KB");
        assert_eq!(file_size_str(1023 * 1024 + 600), "1 MB");
        assert_eq!(file_size_str(5 * 1024 * 1024 + 1), "5 MB");
    }
}
