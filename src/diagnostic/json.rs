use super::{Diagnostic, SourceMap};

/// Render one diagnostic as a single-line JSON object (NDJSON-friendly, so a
/// caller can stream several).
pub fn render(d: &Diagnostic) -> String {
    let source_map = d.source.as_deref().map(SourceMap::new);

    let labels: Vec<serde_json::Value> = d
        .labels
        .iter()
        .map(|label| {
            let mut obj = serde_json::json!({
                "start": label.span.start,
                "end": label.span.end,
                "message": label.message,
            });
            if let Some(map) = &source_map {
                let (line, col) = map.lookup(label.span.start);
                obj["line"] = serde_json::Value::from(line);
                obj["col"] = serde_json::Value::from(col);
            }
            obj
        })
        .collect();

    let mut obj = serde_json::json!({
        "severity": "error",
        "message": d.message,
        "labels": labels,
        "notes": d.notes,
    });

    if let Some(code) = d.code {
        obj["code"] = serde_json::Value::String(code.to_string());
    }
    if let Some(suggestion) = &d.suggestion {
        obj["suggestion"] = serde_json::Value::String(suggestion.clone());
    }

    serde_json::to_string(&obj).unwrap_or_else(|_| {
        r#"{"severity":"error","message":"internal error serializing diagnostic"}"#.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Span;

    fn parse(s: &str) -> serde_json::Value {
        serde_json::from_str(s).expect("valid JSON")
    }

    #[test]
    fn render_basic_error() {
        let out = render(&Diagnostic::error("bad input"));
        let v = parse(&out);
        assert_eq!(v["severity"], "error");
        assert_eq!(v["message"], "bad input");
        assert!(v["labels"].as_array().unwrap().is_empty());
    }

    #[test]
    fn render_with_span_and_source() {
        let d = Diagnostic::error("unexpected input")
            .with_code("WEFT-L001")
            .with_span(Span { start: 9, end: 10 }, "here")
            .with_source("Hello {{ @ }}".to_string());
        let v = parse(&render(&d));
        assert_eq!(v["code"], "WEFT-L001");
        let label = &v["labels"][0];
        assert_eq!(label["start"], 9);
        assert_eq!(label["end"], 10);
        assert_eq!(label["line"], 1);
        assert_eq!(label["col"], 10);
    }

    #[test]
    fn render_without_source_omits_line_col() {
        let d = Diagnostic::error("bad").with_span(Span { start: 2, end: 3 }, "here");
        let v = parse(&render(&d));
        assert!(v["labels"][0].get("line").is_none());
    }

    #[test]
    fn render_suggestion_and_notes() {
        let d = Diagnostic::error("bad")
            .with_note("first note")
            .with_suggestion("do this");
        let v = parse(&render(&d));
        assert_eq!(v["notes"][0], "first note");
        assert_eq!(v["suggestion"], "do this");
    }

    #[test]
    fn output_is_one_line() {
        let d = Diagnostic::error("bad")
            .with_span(Span { start: 0, end: 1 }, "here")
            .with_source("{{ }}".to_string());
        assert!(!render(&d).contains('\n'));
    }
}
