//! Minimal CSV reading for batch files.
//!
//! Handles quoted fields, embedded commas, doubled quotes, and CRLF.
//! Batch files have three columns: `app_name,info_url,form_url`, with an
//! optional header row that is detected and skipped.

/// One batch row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRow {
    pub app_name: String,
    pub info_url: String,
    pub form_url: String,
}

/// Parse a batch CSV file's contents into rows.
///
/// Blank lines and lines starting with `#` are skipped. Rows with the
/// wrong column count are reported as errors with their line number.
pub fn parse_batch(text: &str) -> Result<Vec<BatchRow>, String> {
    let mut rows = Vec::new();
    let mut seen_row = false;

    for (idx, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        let fields = split_fields(line).map_err(|e| format!("line {}: {e}", idx + 1))?;
        if fields.len() != 3 {
            return Err(format!(
                "line {}: expected 3 columns (app_name,info_url,form_url), got {}",
                idx + 1,
                fields.len()
            ));
        }

        // Header row: first parsed line whose URL columns are not URLs
        let is_header = !seen_row
            && !fields[1].trim().starts_with("http")
            && !fields[2].trim().starts_with("http");
        seen_row = true;
        if is_header {
            continue;
        }

        rows.push(BatchRow {
            app_name: fields[0].trim().to_string(),
            info_url: fields[1].trim().to_string(),
            form_url: fields[2].trim().to_string(),
        });
    }

    Ok(rows)
}

/// Split one CSV line into fields, honoring quotes.
fn split_fields(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    // A doubled quote inside a quoted field is a literal quote
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                c => field.push(c),
            }
        } else {
            match c {
                '"' if field.is_empty() => in_quotes = true,
                ',' => {
                    fields.push(std::mem::take(&mut field));
                }
                c => field.push(c),
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(field);
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_rows() {
        let rows = parse_batch(
            "Acme,https://a.example/info,https://a.example/apply\n\
             Beta,https://b.example/info,https://b.example/apply\n",
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].app_name, "Acme");
        assert_eq!(rows[1].form_url, "https://b.example/apply");
    }

    #[test]
    fn test_header_row_is_skipped() {
        let rows = parse_batch(
            "app_name,info_url,form_url\n\
             Acme,https://a.example/info,https://a.example/apply\n",
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].app_name, "Acme");
    }

    #[test]
    fn test_header_after_comments_is_skipped() {
        let rows = parse_batch(
            "# exported batch\n\
             \n\
             app_name,info_url,form_url\n\
             Acme,https://a.example/info,https://a.example/apply\n",
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].app_name, "Acme");
    }

    #[test]
    fn test_quoted_fields_with_commas() {
        let rows = parse_batch(
            r#""Acme, Inc.",https://a.example/info,https://a.example/apply"#,
        )
        .unwrap();
        assert_eq!(rows[0].app_name, "Acme, Inc.");
    }

    #[test]
    fn test_doubled_quotes() {
        let rows =
            parse_batch(r#""The ""Best"" Grant",https://a.example/i,https://a.example/f"#).unwrap();
        assert_eq!(rows[0].app_name, r#"The "Best" Grant"#);
    }

    #[test]
    fn test_blank_lines_and_comments_skipped() {
        let rows = parse_batch(
            "# applications to process\n\
             \n\
             Acme,https://a.example/info,https://a.example/apply\n\
             \n",
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_crlf_line_endings() {
        let rows =
            parse_batch("Acme,https://a.example/info,https://a.example/apply\r\n").unwrap();
        assert_eq!(rows[0].form_url, "https://a.example/apply");
    }

    #[test]
    fn test_wrong_column_count() {
        let err = parse_batch("Acme,https://a.example/info\n").unwrap_err();
        assert!(err.contains("line 1"));
        assert!(err.contains("3 columns"));
    }

    #[test]
    fn test_unterminated_quote() {
        let err = parse_batch("\"Acme,https://a.example/i,https://a.example/f\n").unwrap_err();
        assert!(err.contains("unterminated"));
    }
}
