use alloy_primitives::{FixedBytes, B256};
use serde_json::Value;
use thiserror::Error;

pub const PUBKEY_BYTES: usize = 48;
pub const CREDENTIALS_BYTES: usize = 32;
pub const SIGNATURE_BYTES: usize = 96;
pub const ROOT_BYTES: usize = 32;
pub const FORK_VERSION_BYTES: usize = 4;

pub type Pubkey = FixedBytes<PUBKEY_BYTES>;
pub type Signature = FixedBytes<SIGNATURE_BYTES>;
pub type ForkVersion = FixedBytes<FORK_VERSION_BYTES>;

/// One entry of the deposit-data export format, fully decoded.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DepositRecord {
    /// Validator public key
    pub pubkey: Pubkey,
    /// Withdrawal credentials; the leading byte is the credential type
    pub withdrawal_credentials: B256,
    /// Deposit amount in gwei
    pub amount: u64,
    /// Deposit signature
    pub signature: Signature,
    pub deposit_message_root: B256,
    pub deposit_data_root: B256,
    /// Fork version of the network the file was generated for
    pub fork_version: ForkVersion,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to parse deposit data json: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("Expected an array of deposit records at the top level")]
    NotAnArray,

    #[error("Deposit data file has no records")]
    Empty,

    #[error("Record {index}: field {field} is missing or empty")]
    MissingOrEmptyField { index: usize, field: &'static str },

    #[error("Record {index}: field {field} must be {expected} bytes of hex")]
    FieldLength {
        index: usize,
        field: &'static str,
        expected: usize,
    },
}

/// Parses the raw text of a deposit-data file into an ordered record sequence.
///
/// Field checks replicate the export format's notion of validity: a missing
/// field, an empty string and a zero amount are all equally invalid, since
/// the generator never produces any of them.
pub fn parse_deposit_data(text: &str) -> Result<Vec<DepositRecord>, ParseError> {
    let parsed: Value = serde_json::from_str(text)?;
    let entries = parsed.as_array().ok_or(ParseError::NotAnArray)?;
    if entries.is_empty() {
        return Err(ParseError::Empty);
    }
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| parse_record(index, entry))
        .collect()
}

fn parse_record(index: usize, entry: &Value) -> Result<DepositRecord, ParseError> {
    let pubkey = hex_field::<PUBKEY_BYTES>(index, entry, "pubkey")?;
    let withdrawal_credentials = hex_field::<CREDENTIALS_BYTES>(index, entry, "withdrawal_credentials")?;
    let amount = amount_field(index, entry)?;
    let signature = hex_field::<SIGNATURE_BYTES>(index, entry, "signature")?;
    let deposit_message_root = hex_field::<ROOT_BYTES>(index, entry, "deposit_message_root")?;
    let deposit_data_root = hex_field::<ROOT_BYTES>(index, entry, "deposit_data_root")?;
    let fork_version = hex_field::<FORK_VERSION_BYTES>(index, entry, "fork_version")?;

    Ok(DepositRecord {
        pubkey,
        withdrawal_credentials,
        amount,
        signature,
        deposit_message_root,
        deposit_data_root,
        fork_version,
    })
}

fn amount_field(index: usize, entry: &Value) -> Result<u64, ParseError> {
    let amount = match entry.get("amount") {
        Some(Value::Number(number)) => number.as_u64().unwrap_or(0),
        // Some generators quote the amount
        Some(Value::String(raw)) => raw.parse().unwrap_or(0),
        _ => 0,
    };
    if amount == 0 {
        return Err(ParseError::MissingOrEmptyField { index, field: "amount" });
    }
    Ok(amount)
}

fn hex_field<const N: usize>(
    index: usize,
    entry: &Value,
    field: &'static str,
) -> Result<FixedBytes<N>, ParseError> {
    let raw = entry.get(field).and_then(Value::as_str).unwrap_or("");
    if raw.is_empty() {
        return Err(ParseError::MissingOrEmptyField { index, field });
    }
    let stripped = raw.strip_prefix("0x").unwrap_or(raw);
    let mut bytes = [0u8; N];
    hex::decode_to_slice(stripped, &mut bytes).map_err(|_| ParseError::FieldLength {
        index,
        field,
        expected: N,
    })?;
    Ok(bytes.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record_json(seed: u8) -> Value {
        json!({
            "pubkey": hex::encode([seed; PUBKEY_BYTES]),
            "withdrawal_credentials": hex::encode([0x01; CREDENTIALS_BYTES]),
            "amount": 32000000000u64,
            "signature": hex::encode([seed; SIGNATURE_BYTES]),
            "deposit_message_root": hex::encode([seed; ROOT_BYTES]),
            "deposit_data_root": hex::encode([seed; ROOT_BYTES]),
            "fork_version": "00000064",
        })
    }

    #[test]
    fn parses_valid_records_in_order() {
        let text = serde_json::to_string(&json!([record_json(1), record_json(2)])).unwrap();
        let records = parse_deposit_data(&text).expect("Failed to parse");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].pubkey, Pubkey::from([1u8; PUBKEY_BYTES]));
        assert_eq!(records[1].pubkey, Pubkey::from([2u8; PUBKEY_BYTES]));
        assert_eq!(records[0].amount, 32000000000);
        assert_eq!(records[0].fork_version, ForkVersion::from([0, 0, 0, 0x64]));
    }

    #[test]
    fn accepts_0x_prefixed_hex() {
        let mut entry = record_json(3);
        entry["pubkey"] = json!(format!("0x{}", hex::encode([3u8; PUBKEY_BYTES])));
        let text = serde_json::to_string(&json!([entry])).unwrap();
        let records = parse_deposit_data(&text).expect("Failed to parse");
        assert_eq!(records[0].pubkey, Pubkey::from([3u8; PUBKEY_BYTES]));
    }

    #[test]
    fn rejects_invalid_json() {
        let result = parse_deposit_data("not json at all");
        assert!(matches!(result, Err(ParseError::MalformedJson(_))));
    }

    #[test]
    fn rejects_non_array_top_level() {
        let result = parse_deposit_data(r#"{"pubkey": "aa"}"#);
        assert!(matches!(result, Err(ParseError::NotAnArray)));
    }

    #[test]
    fn rejects_empty_array() {
        let result = parse_deposit_data("[]");
        assert!(matches!(result, Err(ParseError::Empty)));
    }

    #[test]
    fn rejects_missing_field() {
        let mut entry = record_json(1);
        entry.as_object_mut().unwrap().remove("signature");
        let text = serde_json::to_string(&json!([record_json(0), entry])).unwrap();
        let result = parse_deposit_data(&text);
        assert!(matches!(
            result,
            Err(ParseError::MissingOrEmptyField { index: 1, field: "signature" })
        ));
    }

    #[test]
    fn rejects_empty_string_field() {
        let mut entry = record_json(1);
        entry["withdrawal_credentials"] = json!("");
        let text = serde_json::to_string(&json!([entry])).unwrap();
        let result = parse_deposit_data(&text);
        assert!(matches!(
            result,
            Err(ParseError::MissingOrEmptyField { index: 0, field: "withdrawal_credentials" })
        ));
    }

    #[test]
    fn zero_amount_is_as_invalid_as_a_missing_one() {
        let mut entry = record_json(1);
        entry["amount"] = json!(0);
        let text = serde_json::to_string(&json!([entry])).unwrap();
        let result = parse_deposit_data(&text);
        assert!(matches!(
            result,
            Err(ParseError::MissingOrEmptyField { index: 0, field: "amount" })
        ));
    }

    #[test]
    fn rejects_wrong_width_hex() {
        let mut entry = record_json(1);
        entry["pubkey"] = json!(hex::encode([1u8; 47]));
        let text = serde_json::to_string(&json!([entry])).unwrap();
        let result = parse_deposit_data(&text);
        assert!(matches!(
            result,
            Err(ParseError::FieldLength { index: 0, field: "pubkey", expected: PUBKEY_BYTES })
        ));
    }

    #[test]
    fn quoted_amount_is_accepted() {
        let mut entry = record_json(1);
        entry["amount"] = json!("32000000000");
        let text = serde_json::to_string(&json!([entry])).unwrap();
        let records = parse_deposit_data(&text).expect("Failed to parse");
        assert_eq!(records[0].amount, 32000000000);
    }
}
