use chrono::NaiveDate;
use tracing::warn;

use crate::error::{LedgerError, Result};
use crate::models::RawRecord;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a Brazilian statement amount: `1.234,56`, `-50,00`, `R$ 30,00`,
/// parenthesized negatives. Returns `None` for anything non-numeric so the
/// caller can skip the row.
pub fn parse_amount_br(raw: &str) -> Option<f64> {
    let s = raw
        .replace("R$", "")
        .replace('.', "")
        .replace(',', ".")
        .replace('"', "");
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return inner.trim().parse::<f64>().ok().map(|v| -v);
    }
    s.parse().ok()
}

/// Parse a `DD/MM/YYYY` statement date.
pub fn parse_date_dmy(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let d: u32 = parts[0].parse().ok()?;
    let m: u32 = parts[1].parse().ok()?;
    let y: i32 = parts[2].parse().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)
}

/// Gatekeeping before any parsing work: extension and byte ceiling.
pub fn check_file(filename: &str, size: u64, limit: u64) -> Result<()> {
    let ext = filename.rsplit('.').next().unwrap_or("");
    if !ext.eq_ignore_ascii_case("csv") {
        return Err(LedgerError::UnsupportedFormat(format!(
            "no parser registered for .{ext} files"
        )));
    }
    if size > limit {
        return Err(LedgerError::FileTooLarge { size, limit });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Bank kinds — enum dispatch instead of trait objects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bank {
    Itau,
    Bradesco,
    Santander,
}

impl Bank {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Itau => "itau",
            Self::Bradesco => "bradesco",
            Self::Santander => "santander",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Itau => "Itaú",
            Self::Bradesco => "Bradesco",
            Self::Santander => "Santander",
        }
    }

    fn detect(&self, content: &str) -> bool {
        // Banks stamp their name in the export preamble; scan the first lines.
        let head: String = content.lines().take(5).collect::<Vec<_>>().join("\n");
        match self {
            Self::Itau => head.contains("Itaú") || head.contains("ITAU"),
            Self::Bradesco => head.contains("BRADESCO") || head.contains("Bradesco"),
            Self::Santander => head.contains("Santander") || head.contains("SANTANDER"),
        }
    }

    pub fn parse(&self, bytes: &[u8]) -> Result<Vec<RawRecord>> {
        let content = String::from_utf8_lossy(bytes);
        match self {
            Self::Itau => parse_itau(&content),
            Self::Bradesco => parse_bradesco(&content),
            Self::Santander => parse_santander(&content),
        }
    }
}

const ALL_BANKS: &[Bank] = &[Bank::Itau, Bank::Bradesco, Bank::Santander];

pub fn get_by_key(key: &str) -> Option<Bank> {
    ALL_BANKS.iter().find(|b| b.key() == key).copied()
}

/// Identify the issuing bank from statement content.
pub fn identify(bytes: &[u8]) -> Result<Bank> {
    let content = String::from_utf8_lossy(bytes);
    ALL_BANKS
        .iter()
        .find(|b| b.detect(&content))
        .copied()
        .ok_or_else(|| {
            LedgerError::UnsupportedFormat("statement does not match any supported bank".into())
        })
}

// ---------------------------------------------------------------------------
// Itaú parser
// ---------------------------------------------------------------------------

fn parse_itau(content: &str) -> Result<Vec<RawRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());
    let mut rows = Vec::new();
    let mut found_header = false;

    for result in rdr.records() {
        let Ok(record) = result else { continue };
        if !found_header {
            if record.len() >= 3
                && record[0].trim().eq_ignore_ascii_case("data")
                && record[1].to_lowercase().contains("lançamento")
            {
                found_header = true;
            }
            continue;
        }
        if record.len() < 3 || record[0].trim().is_empty() {
            continue;
        }
        let Some(date) = parse_date_dmy(&record[0]) else {
            warn!(row = %record[0].trim(), "skipping row with unparseable date");
            continue;
        };
        let description = record[1].trim().to_string();
        if description.is_empty() || description.to_uppercase().contains("SALDO") {
            continue;
        }
        let Some(amount) = parse_amount_br(&record[2]) else {
            warn!(description = %description, "skipping row with unparseable amount");
            continue;
        };
        rows.push(RawRecord {
            date,
            description,
            amount,
            external_id: None,
        });
    }

    if !found_header {
        return Err(LedgerError::MalformedInput(
            "Itaú statement is missing the data;lançamento;valor header".into(),
        ));
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Bradesco parser
// ---------------------------------------------------------------------------

fn parse_bradesco(content: &str) -> Result<Vec<RawRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());
    let mut rows = Vec::new();
    let mut found_header = false;
    let (mut idx_date, mut idx_desc, mut idx_credit, mut idx_debit) = (0, 1, 3, 4);

    for result in rdr.records() {
        let Ok(record) = result else { continue };
        if !found_header {
            if record.iter().any(|f| f.trim() == "Data")
                && record.iter().any(|f| f.contains("Histórico"))
            {
                for (i, field) in record.iter().enumerate() {
                    let f = field.trim();
                    if f == "Data" {
                        idx_date = i;
                    }
                    if f.contains("Histórico") {
                        idx_desc = i;
                    }
                    if f.contains("Crédito") {
                        idx_credit = i;
                    }
                    if f.contains("Débito") {
                        idx_debit = i;
                    }
                }
                found_header = true;
            }
            continue;
        }
        let min_cols = [idx_date, idx_desc, idx_credit, idx_debit]
            .into_iter()
            .max()
            .unwrap_or(0)
            + 1;
        if record.len() < min_cols || record[idx_date].trim().is_empty() {
            continue;
        }
        let Some(date) = parse_date_dmy(&record[idx_date]) else {
            continue;
        };
        let description = record[idx_desc].trim().to_string();
        if description.is_empty() || description.to_uppercase().contains("SALDO") {
            continue;
        }
        // Credit and debit live in separate columns; exactly one is filled.
        let amount = match parse_amount_br(&record[idx_credit]) {
            Some(credit) => credit.abs(),
            None => match parse_amount_br(&record[idx_debit]) {
                Some(debit) => -debit.abs(),
                None => {
                    warn!(description = %description, "skipping row with no credit or debit value");
                    continue;
                }
            },
        };
        rows.push(RawRecord {
            date,
            description,
            amount,
            external_id: None,
        });
    }

    if !found_header {
        return Err(LedgerError::MalformedInput(
            "Bradesco statement is missing the Data/Histórico header".into(),
        ));
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Santander parser
// ---------------------------------------------------------------------------

fn parse_santander(content: &str) -> Result<Vec<RawRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());
    let mut rows = Vec::new();
    let mut found_header = false;

    for result in rdr.records() {
        let Ok(record) = result else { continue };
        if !found_header {
            if record.len() >= 3
                && record[0].trim() == "Data"
                && record[1].contains("Descrição")
            {
                found_header = true;
            }
            continue;
        }
        if record.len() < 3 || record[0].trim().is_empty() {
            continue;
        }
        let Some(date) = parse_date_dmy(&record[0]) else {
            continue;
        };
        let description = record[1].trim().to_string();
        if description.is_empty() || description.to_uppercase().contains("SALDO") {
            continue;
        }
        let Some(amount) = parse_amount_br(&record[2]) else {
            warn!(description = %description, "skipping row with unparseable amount");
            continue;
        };
        rows.push(RawRecord {
            date,
            description,
            amount,
            external_id: None,
        });
    }

    if !found_header {
        return Err(LedgerError::MalformedInput(
            "Santander statement is missing the Data,Descrição,Valor header".into(),
        ));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_parse_amount_br() {
        assert_eq!(parse_amount_br("1.234,56"), Some(1234.56));
        assert_eq!(parse_amount_br("-50,00"), Some(-50.0));
        assert_eq!(parse_amount_br("R$ 30,00"), Some(30.0));
        assert_eq!(parse_amount_br("(500,00)"), Some(-500.0));
        assert_eq!(parse_amount_br(""), None);
        assert_eq!(parse_amount_br("abc"), None);
    }

    #[test]
    fn test_parse_date_dmy() {
        assert_eq!(parse_date_dmy("15/01/2024"), Some(d("2024-01-15")));
        assert_eq!(parse_date_dmy("01/12/2024"), Some(d("2024-12-01")));
        assert_eq!(parse_date_dmy("30/02/2024"), None);
        assert_eq!(parse_date_dmy("2024-01-15"), None);
    }

    #[test]
    fn test_check_file_rejects_extension() {
        let err = check_file("extrato.xlsx", 100, 1024).unwrap_err();
        assert!(matches!(err, LedgerError::UnsupportedFormat(_)));
        assert!(check_file("extrato.csv", 100, 1024).is_ok());
        assert!(check_file("extrato.CSV", 100, 1024).is_ok());
    }

    #[test]
    fn test_check_file_rejects_oversize() {
        let err = check_file("extrato.csv", 2048, 1024).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::FileTooLarge { size: 2048, limit: 1024 }
        ));
    }

    #[test]
    fn test_identify_by_content() {
        let itau = "Extrato Conta Corrente - Itaú Unibanco\ndata;lançamento;valor\n";
        assert_eq!(identify(itau.as_bytes()).unwrap(), Bank::Itau);
        let bradesco = "BRADESCO INTERNET BANKING;;\nData;Histórico;Docto.;Crédito (R$);Débito (R$)\n";
        assert_eq!(identify(bradesco.as_bytes()).unwrap(), Bank::Bradesco);
        let other = "Date,Description,Amount\n01/15/2024,COFFEE,-4.50\n";
        assert!(matches!(
            identify(other.as_bytes()),
            Err(LedgerError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_itau_parse() {
        let content = "\
Extrato Conta Corrente - Itaú Unibanco;;
data;lançamento;valor
01/01/2024;PIX para Maria;-50,00
02/01/2024;Salário;3.000,00
03/01/2024;SALDO DO DIA;2.950,00
03/01/2024;Restaurante XYZ;-80,00
";
        let rows = Bank::Itau.parse(content.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].description, "PIX para Maria");
        assert_eq!(rows[0].amount, -50.0);
        assert_eq!(rows[0].date, d("2024-01-01"));
        assert_eq!(rows[1].amount, 3000.0);
        assert_eq!(rows[2].description, "Restaurante XYZ");
        assert!(rows.iter().all(|r| r.external_id.is_none()));
    }

    #[test]
    fn test_itau_missing_header_is_structural() {
        let content = "01/01/2024;PIX para Maria;-50,00\n";
        assert!(matches!(
            Bank::Itau.parse(content.as_bytes()),
            Err(LedgerError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_itau_skips_malformed_rows() {
        let content = "\
data;lançamento;valor
99/99/2024;Broken date;-10,00
01/01/2024;Good row;-10,00
02/01/2024;Broken amount;n/a
";
        let rows = Bank::Itau.parse(content.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description, "Good row");
    }

    #[test]
    fn test_bradesco_parse_credit_debit_columns() {
        let content = "\
BRADESCO INTERNET BANKING;;;;
Data;Histórico;Docto.;Crédito (R$);Débito (R$)
05/01/2024;TED RECEBIDA;123;1.500,00;
06/01/2024;PAGAMENTO BOLETO;124;;200,00
";
        let rows = Bank::Bradesco.parse(content.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].amount, 1500.0);
        assert_eq!(rows[1].amount, -200.0);
    }

    #[test]
    fn test_santander_parse() {
        let content = "\
Santander - Extrato,,
Data,Descrição,Valor
10/01/2024,Uber Trip,\"-25,90\"
11/01/2024,Deposito,\"100,00\"
";
        let rows = Bank::Santander.parse(content.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].amount, -25.9);
        assert_eq!(rows[1].amount, 100.0);
    }

    #[test]
    fn test_parse_preserves_source_order() {
        let content = "\
data;lançamento;valor
03/01/2024;Terceiro;-1,00
01/01/2024;Primeiro;-1,00
02/01/2024;Segundo;-1,00
";
        let rows = Bank::Itau.parse(content.as_bytes()).unwrap();
        let descs: Vec<&str> = rows.iter().map(|r| r.description.as_str()).collect();
        assert_eq!(descs, vec!["Terceiro", "Primeiro", "Segundo"]);
    }
}
