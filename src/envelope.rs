//! Response envelope returned by the dashboard's indicator endpoints.

// self
use crate::_prelude::*;

/// `{ code, data, message }` wrapper; unknown fields are ignored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
	/// Application-level status code (mirrors HTTP `200` on success).
	pub code: i64,
	/// Payload.
	pub data: T,
	/// Human-readable message, if any.
	#[serde(default)]
	pub message: Option<String>,
}
impl<T> ApiEnvelope<T> {
	/// Returns true when the application-level code signals success.
	pub fn is_ok(&self) -> bool {
		self.code == 200
	}

	/// Consumes the envelope, returning its payload.
	pub fn into_data(self) -> T {
		self.data
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[derive(Debug, Deserialize, PartialEq)]
	#[serde(rename_all = "camelCase")]
	struct IndicatorPoint {
		p_day_id: String,
		prev_day: f64,
	}

	#[test]
	fn indicator_payload_decodes_and_ignores_extra_fields() {
		let raw = r#"{
			"code": 200,
			"message": "ok",
			"maxPDayId": "20250301",
			"data": [{ "pDayId": "20250301", "prevDay": 97.5 }]
		}"#;
		let envelope: ApiEnvelope<Vec<IndicatorPoint>> =
			serde_json::from_str(raw).expect("Indicator envelope should decode.");

		assert!(envelope.is_ok());
		assert_eq!(
			envelope.into_data(),
			vec![IndicatorPoint { p_day_id: "20250301".into(), prev_day: 97.5 }]
		);
	}
}
