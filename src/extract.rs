//! Field extraction over raw FISPQ text.
//!
//! One rule per field: a set of label synonyms plus a capture policy,
//! compiled once into a regex. Fields are independent; a pattern miss
//! yields None for that field only.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// One extracted data sheet. Field names carry the store column names via
/// serde, so the CSV header and the JSON snapshot keys come from this single
/// definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "substancia")]
    pub substance: Option<String>,
    #[serde(rename = "numero_onu")]
    pub un_number: Option<String>,
    #[serde(rename = "numero_risco")]
    pub risk_number: Option<String>,
    #[serde(rename = "classe")]
    pub hazard_class: Option<String>,
    #[serde(rename = "risco_subsidiario")]
    pub subsidiary_risk: Option<String>,
    #[serde(rename = "primeiros_socorros")]
    pub first_aid: Option<String>,
    #[serde(rename = "medidas_incendio")]
    pub fire_fighting: Option<String>,
    #[serde(rename = "arquivo")]
    pub source_file: String,
}

impl Record {
    /// Column names in declaration order. `arquivo` is last and is the
    /// unique key. Must stay in lock-step with the serde renames above;
    /// the `columns_match_flat_file_header` test enforces that.
    pub const COLUMNS: [&'static str; 8] = [
        "substancia",
        "numero_onu",
        "numero_risco",
        "classe",
        "risco_subsidiario",
        "primeiros_socorros",
        "medidas_incendio",
        "arquivo",
    ];
}

#[derive(Debug, Clone, Copy)]
enum Capture {
    /// Rest of the line after the label.
    Line,
    /// Rest of the line, also stopping at a colon.
    LineNoColon,
    /// Run of digits with a bounded length.
    Digits { min: usize, max: Option<usize> },
    /// Dotted class code, tolerating a trailing parenthesized subsidiary
    /// code that is not part of the stored value.
    ClassCode,
    /// Everything after the heading up to the next numbered heading.
    Block,
}

struct Rule {
    re: Regex,
    capture: Capture,
}

/// Boundary for block captures: the next "N. " section heading.
static NEXT_HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+\.\s").unwrap());

impl Rule {
    fn new(labels: &[&str], capture: Capture) -> Self {
        let labels = labels.join("|");
        let pattern = match capture {
            Capture::Line => format!(r"(?i)(?:{labels})\s*[:\-]?\s*([^\n]+)"),
            Capture::LineNoColon => format!(r"(?i)(?:{labels})\s*[:\-]?\s*([^\n:]+)"),
            Capture::Digits { min, max } => {
                let run = match max {
                    Some(max) => format!(r"\d{{{min},{max}}}"),
                    None => format!(r"\d{{{min},}}"),
                };
                format!(r"(?i)(?:{labels})\s*[:\-]?\s*({run})")
            }
            Capture::ClassCode => {
                format!(r"(?i)(?:{labels})\s*[:\-]?\s*(\d+(?:\.\d+)?)\s*(?:\((\d+)\))?")
            }
            Capture::Block => format!(r"(?i)(?:{labels})"),
        };
        Rule {
            re: Regex::new(&pattern).unwrap(),
            capture,
        }
    }

    fn apply(&self, text: &str) -> Option<String> {
        let value = match self.capture {
            Capture::Block => {
                // The regex crate has no lookahead, so the "until the next
                // heading" boundary is a second search over the remainder.
                let header = self.re.find(text)?;
                let rest = &text[header.end()..];
                let end = NEXT_HEADING.find(rest).map_or(rest.len(), |m| m.start());
                rest[..end].trim().to_string()
            }
            _ => self.re.captures(text)?.get(1)?.as_str().trim().to_string(),
        };
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }
}

struct Rules {
    substance: Rule,
    un_number: Rule,
    risk_number: Rule,
    hazard_class: Rule,
    subsidiary_risk: Rule,
    first_aid: Rule,
    fire_fighting: Rule,
}

static RULES: LazyLock<Rules> = LazyLock::new(|| Rules {
    substance: Rule::new(&["Nome do produto", "Substância"], Capture::LineNoColon),
    un_number: Rule::new(
        &["Número ONU", "ONU"],
        Capture::Digits { min: 4, max: Some(5) },
    ),
    risk_number: Rule::new(
        &["Número de Risco", "Risco"],
        Capture::Digits { min: 1, max: None },
    ),
    hazard_class: Rule::new(
        &[r"Classe\s*/\s*subclasse\s*de\s*risco\s*principal\s*e\s*subsidiário"],
        Capture::ClassCode,
    ),
    subsidiary_risk: Rule::new(&["Risco Subsidiário", "Subsidiário"], Capture::Line),
    first_aid: Rule::new(
        &[r"4\.\s*PRIMEIROS SOCORROS", "PRIMEIROS SOCORROS"],
        Capture::Block,
    ),
    fire_fighting: Rule::new(
        &[r"5\.\s*MEDIDAS DE COMBATE A INCÊNDIO", "COMBATE A INCÊNDIO"],
        Capture::Block,
    ),
});

/// Run every field rule over the document text. A document with no text
/// layer still produces a record, with every field None and only the
/// source file name set.
pub fn extract(text: &str, source_file: &str) -> Record {
    Record {
        substance: RULES.substance.apply(text),
        un_number: RULES.un_number.apply(text),
        risk_number: RULES.risk_number.apply(text),
        hazard_class: RULES.hazard_class.apply(text),
        subsidiary_risk: RULES.subsidiary_risk.apply(text),
        first_aid: RULES.first_aid.apply(text),
        fire_fighting: RULES.fire_fighting.apply(text),
        source_file: source_file.to_string(),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_empty_record() {
        let r = extract("", "sheet.pdf");
        assert_eq!(r.substance, None);
        assert_eq!(r.un_number, None);
        assert_eq!(r.risk_number, None);
        assert_eq!(r.hazard_class, None);
        assert_eq!(r.subsidiary_risk, None);
        assert_eq!(r.first_aid, None);
        assert_eq!(r.fire_fighting, None);
        assert_eq!(r.source_file, "sheet.pdf");
    }

    #[test]
    fn substance_with_colon() {
        let r = extract("Nome do produto: Ácido Sulfúrico\nOutra linha", "a.pdf");
        assert_eq!(r.substance.as_deref(), Some("Ácido Sulfúrico"));
    }

    #[test]
    fn substance_synonym_with_dash() {
        let r = extract("Substância - Etanol Anidro", "a.pdf");
        assert_eq!(r.substance.as_deref(), Some("Etanol Anidro"));
    }

    #[test]
    fn un_number_requires_four_digits() {
        assert_eq!(
            extract("Número ONU: 1230", "a.pdf").un_number.as_deref(),
            Some("1230")
        );
        assert_eq!(extract("ONU 123", "a.pdf").un_number, None);
    }

    #[test]
    fn risk_number() {
        let r = extract("Número de Risco: 60", "a.pdf");
        assert_eq!(r.risk_number.as_deref(), Some("60"));
    }

    #[test]
    fn risk_label_without_digits_is_a_miss() {
        // "Risco Subsidiário: Corrosivo" must not feed the risk number.
        let r = extract("Risco Subsidiário: Corrosivo", "a.pdf");
        assert_eq!(r.risk_number, None);
        assert_eq!(r.subsidiary_risk.as_deref(), Some("Corrosivo"));
    }

    #[test]
    fn hazard_class_keeps_dotted_code_only() {
        let text = "Classe / subclasse de risco principal e subsidiário: 6.1 (8)";
        let r = extract(text, "a.pdf");
        assert_eq!(r.hazard_class.as_deref(), Some("6.1"));
    }

    #[test]
    fn hazard_class_plain_number() {
        let text = "Classe/subclasse de risco principal e subsidiário - 3";
        let r = extract(text, "a.pdf");
        assert_eq!(r.hazard_class.as_deref(), Some("3"));
    }

    #[test]
    fn block_capture_stops_at_next_heading() {
        let text = "4. PRIMEIROS SOCORROS\nLavar com água em abundância.\n5. MEDIDAS DE COMBATE A INCÊNDIO\nUsar espuma resistente ao álcool.";
        let r = extract(text, "a.pdf");
        assert_eq!(r.first_aid.as_deref(), Some("Lavar com água em abundância."));
        assert_eq!(
            r.fire_fighting.as_deref(),
            Some("Usar espuma resistente ao álcool.")
        );
    }

    #[test]
    fn block_capture_runs_to_end_of_text() {
        let text = "5. MEDIDAS DE COMBATE A INCÊNDIO\nPó químico seco.\nDióxido de carbono.";
        let r = extract(text, "a.pdf");
        assert_eq!(
            r.fire_fighting.as_deref(),
            Some("Pó químico seco.\nDióxido de carbono.")
        );
    }

    #[test]
    fn block_header_without_section_number() {
        let text = "PRIMEIROS SOCORROS\nRemover a vítima para local ventilado.\n6. MEDIDAS A TOMAR\nisolar.";
        let r = extract(text, "a.pdf");
        assert_eq!(
            r.first_aid.as_deref(),
            Some("Remover a vítima para local ventilado.")
        );
    }

    #[test]
    fn full_sheet() {
        let text = "FISPQ\nNome do produto: Tolueno\nNúmero ONU: 1294\nNúmero de Risco: 33\nRisco Subsidiário: Não aplicável\nClasse / subclasse de risco principal e subsidiário: 3\n4. PRIMEIROS SOCORROS\nInalação: remover para ar fresco.\n5. MEDIDAS DE COMBATE A INCÊNDIO\nEspuma, pó químico.\n6. MEDIDAS A TOMAR EM CASO DE FUGAS ACIDENTAIS\nConter o vazamento.";
        let r = extract(text, "tolueno.pdf");
        assert_eq!(r.substance.as_deref(), Some("Tolueno"));
        assert_eq!(r.un_number.as_deref(), Some("1294"));
        assert_eq!(r.risk_number.as_deref(), Some("33"));
        assert_eq!(r.hazard_class.as_deref(), Some("3"));
        assert_eq!(r.subsidiary_risk.as_deref(), Some("Não aplicável"));
        assert_eq!(
            r.first_aid.as_deref(),
            Some("Inalação: remover para ar fresco.")
        );
        assert_eq!(r.fire_fighting.as_deref(), Some("Espuma, pó químico."));
        assert_eq!(r.source_file, "tolueno.pdf");
    }

    #[test]
    fn columns_match_flat_file_header() {
        let mut w = csv::Writer::from_writer(Vec::new());
        w.serialize(extract("", "a.pdf")).unwrap();
        let data = String::from_utf8(w.into_inner().unwrap()).unwrap();
        let header = data.lines().next().unwrap();
        assert_eq!(header, Record::COLUMNS.join(","));
    }
}
