//! Plain-text table rendering for CSV produced by `convert_to_table`.

/// Split CSV text into records. Handles quoted fields and `""` escapes.
pub fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.trim().chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.is_empty() => in_quotes = true,
            (',', false) => record.push(std::mem::take(&mut field)),
            ('\r', false) => {}
            ('\n', false) => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

/// Render CSV as an aligned text table. `None` when there is no header row
/// or a record's width does not match the header.
pub fn render(csv: &str) -> Option<String> {
    let records = parse_csv(csv);
    let header = records.first()?;
    if records.iter().any(|r| r.len() != header.len()) {
        return None;
    }

    let widths: Vec<usize> = (0..header.len())
        .map(|col| {
            records
                .iter()
                .map(|r| r[col].chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |record: &[String]| -> String {
        record
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(header.as_slice())];
    out.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    out.extend(records[1..].iter().map(|r| line(r.as_slice())));
    Some(out.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_fields() {
        let rows = parse_csv("Name,Title\n\"Doe, John\",\"The \"\"Best\"\"\"\n");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["Doe, John", "The \"Best\""]);
    }

    #[test]
    fn renders_aligned_table() {
        let table = render("Artist,Albums\nAC/DC,2\nAerosmith,10").unwrap();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "Artist    | Albums");
        assert_eq!(lines[1], "----------+-------");
        assert_eq!(lines[2], "AC/DC     | 2");
        assert_eq!(lines[3], "Aerosmith | 10");
    }

    #[test]
    fn ragged_or_empty_csv_is_rejected() {
        assert!(render("").is_none());
        assert!(render("a,b\n1").is_none());
    }
}
