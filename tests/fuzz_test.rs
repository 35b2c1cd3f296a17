//! Randomized tests for the SQL safety validator.
//!
//! This suite generates random, malicious, and edge-case inputs to check
//! that classification never panics and never lets a write through.

use db_analyzer_mcp::tools::sql_validator::{BLOCKED_KEYWORDS, Classification, classify};
use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;

const ITERATIONS: usize = 2_000;

/// Generate random string of given length
fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Random text drawn from SQL-ish punctuation, quotes and comment markers
fn random_sql_noise(len: usize) -> String {
    const PIECES: &[&str] = &[
        " ", "'", "\"", "$$", "$1", "?", ";", "--", "/*", "*/", "\n", "(", ")", ",", "=", "E'",
        "\\", "*", "a", "id", "FROM", "WHERE", "é", "\u{0}",
    ];
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| *PIECES.choose(&mut rng).unwrap_or(&" "))
        .collect()
}

/// Generate various edge-case strings
fn edge_case_strings() -> Vec<String> {
    vec![
        String::new(),
        " ".to_string(),
        "\n\r\t".to_string(),
        "\0".to_string(),
        "üöÄ".repeat(100),
        "'OR 1=1--".to_string(),
        "'; DROP TABLE users--".to_string(),
        "a".repeat(100_000),
        "\u{0000}\u{FFFF}".to_string(),
        "';SELECT * FROM information_schema.tables--".to_string(),
        "1' UNION SELECT NULL, NULL--".to_string(),
        "/*".to_string(),
        "*/".to_string(),
        "$$".to_string(),
        "$tag$".to_string(),
        "E'\\".to_string(),
        "SELECT '".to_string(),
        "SELECT \"".to_string(),
        "SELECT $a$ unterminated".to_string(),
    ]
}

#[test]
fn fuzz_edge_cases_never_panic() {
    for input in edge_case_strings() {
        let _ = classify(&input);
        let _ = classify(&format!("SELECT {}", input));
    }
}

#[test]
fn fuzz_random_noise_never_panics() {
    let mut rng = rand::thread_rng();
    for _ in 0..ITERATIONS {
        let len = rng.gen_range(0..64);
        let noise = random_sql_noise(len);
        let _ = classify(&noise);
        let _ = classify(&format!("SELECT {}", noise));
    }
}

/// Anything whose first word is not SELECT is unsafe.
#[test]
fn fuzz_non_select_lead_is_unsafe() {
    let mut rng = rand::thread_rng();
    for _ in 0..ITERATIONS {
        let len = rng.gen_range(1..12);
        let word = random_string(len);
        if word.eq_ignore_ascii_case("select") {
            continue;
        }
        let tail = random_sql_noise(rng.gen_range(0..16));
        let sql = format!("{} {}", word, tail);
        assert!(!classify(&sql).is_safe(), "accepted {:?}", sql);
    }
}

/// A blocked keyword inserted as a separate word anywhere makes a SELECT unsafe,
/// whatever its case.
#[test]
fn fuzz_blocked_keyword_anywhere_is_unsafe() {
    let mut rng = rand::thread_rng();
    for _ in 0..ITERATIONS {
        let keyword = BLOCKED_KEYWORDS.choose(&mut rng).copied().unwrap_or("DROP");
        let keyword: String = keyword
            .chars()
            .map(|c| {
                if rng.gen_bool(0.5) {
                    c.to_ascii_lowercase()
                } else {
                    c
                }
            })
            .collect();

        let words: Vec<String> = (0..rng.gen_range(0..6))
            .map(|_| format!("c{}", random_string(rng.gen_range(1..6))))
            .collect();
        let at = rng.gen_range(0..=words.len());
        let mut tail = words.clone();
        tail.insert(at, keyword.clone());

        let sql = format!("SELECT {} FROM t", tail.join(" "));
        assert!(
            matches!(classify(&sql), Classification::Unsafe(_)),
            "accepted {:?}",
            sql
        );
    }
}

/// Any further statement after a separator is unsafe.
#[test]
fn fuzz_stacked_statement_is_unsafe() {
    let mut rng = rand::thread_rng();
    for _ in 0..ITERATIONS {
        let second = format!("c{}", random_string(rng.gen_range(1..10)));
        let sql = format!("SELECT 1;{}{}", " ".repeat(rng.gen_range(0..3)), second);
        assert!(!classify(&sql).is_safe(), "accepted {:?}", sql);
    }
}

/// Plain identifier lists are accepted.
#[test]
fn fuzz_simple_selects_are_safe() {
    let mut rng = rand::thread_rng();
    for _ in 0..ITERATIONS {
        let columns: Vec<String> = (0..rng.gen_range(1..5))
            .map(|_| format!("c_{}", random_string(rng.gen_range(1..8))))
            .collect();
        let sql = format!("SELECT {} FROM t_{}", columns.join(", "), random_string(4));
        assert!(classify(&sql).is_safe(), "rejected {:?}", sql);
    }
}
