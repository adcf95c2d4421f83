//! CNINFO endpoints and request parameters.

use chrono::NaiveDate;
use finstat_core::{
    NameDictionary, ProviderLayout, Request, StatementKind, fields, form,
};
use serde::{Deserialize, Serialize};

/// Endpoint layout of the CNINFO API.
///
/// Statement requests ask for consolidated statements (`type=071001`) from the
/// formal periodic reports (`source=033003`). The classification request asks
/// for the regulator's scheme (`platetype=137002`).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CnInfoLayout {
    /// Income statement endpoint.
    pub income_endpoint: String,
    /// Balance sheet endpoint.
    pub balance_endpoint: String,
    /// Cash flow statement endpoint.
    pub cash_flow_endpoint: String,
    /// Consolidation type filter.
    pub statement_type: String,
    /// Report source filter.
    pub report_source: String,
    /// Industry classification endpoint.
    pub classification_endpoint: String,
    /// Classification scheme code.
    pub plate_type: String,
    /// Daily quote endpoint.
    pub quote_endpoint: String,
    /// Quote field holding the security code.
    pub quote_code_field: String,
    /// Quote field holding the closing price.
    pub quote_price_field: String,
}

impl Default for CnInfoLayout {
    fn default() -> Self {
        Self {
            income_endpoint: "api/stock/p_stock2301".to_string(),
            balance_endpoint: "api/stock/p_stock2300".to_string(),
            cash_flow_endpoint: "api/stock/p_stock2302".to_string(),
            statement_type: "071001".to_string(),
            report_source: "033003".to_string(),
            classification_endpoint: "api/stock/p_public0004".to_string(),
            plate_type: "137002".to_string(),
            quote_endpoint: "api/stock/p_stock2402".to_string(),
            quote_code_field: "SECCODE".to_string(),
            quote_price_field: "F002N".to_string(),
        }
    }
}

impl CnInfoLayout {
    fn statement_endpoint(&self, kind: StatementKind) -> &str {
        match kind {
            StatementKind::Income => &self.income_endpoint,
            StatementKind::Balance => &self.balance_endpoint,
            StatementKind::CashFlow => &self.cash_flow_endpoint,
        }
    }
}

impl ProviderLayout for CnInfoLayout {
    fn statements(&self, kind: StatementKind, codes: &[String], period: &str) -> Request {
        let scode = codes.join(",");
        Request::new(
            self.statement_endpoint(kind),
            form([
                ("scode", scode.as_str()),
                ("type", self.statement_type.as_str()),
                ("source", self.report_source.as_str()),
                ("rdate", period),
            ]),
        )
    }

    fn classification(&self) -> Request {
        Request::new(
            &self.classification_endpoint,
            form([("platetype", self.plate_type.as_str())]),
        )
    }

    fn classification_dictionary(&self) -> NameDictionary {
        NameDictionary::from_pairs([
            ("SECCODE", fields::CODE),
            ("SECNAME", fields::NAME),
            ("F009V", fields::CLASS_CODE),
            ("F004V", fields::CLASS_NAME),
            ("F011V", fields::SUBCLASS_CODE),
            ("F006V", fields::SUBCLASS_NAME),
        ])
    }

    fn daily_quotes(&self, codes: &[String], date: NaiveDate) -> Request {
        let scode = codes.join(",");
        let day = date.format("%Y-%m-%d").to_string();
        Request::new(
            &self.quote_endpoint,
            form([
                ("scode", scode.as_str()),
                ("sdate", day.as_str()),
                ("edate", day.as_str()),
            ]),
        )
    }

    fn quote_dictionary(&self) -> NameDictionary {
        NameDictionary::from_pairs([
            (self.quote_code_field.as_str(), fields::CODE),
            (self.quote_price_field.as_str(), fields::PRICE),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param<'a>(request: &'a Request, key: &str) -> Option<&'a str> {
        request
            .params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_statement_requests() {
        let layout = CnInfoLayout::default();
        let codes = vec!["000651".to_string(), "000333".to_string()];

        let income = layout.statements(StatementKind::Income, &codes, "2018-12-31");
        assert_eq!(income.endpoint, "api/stock/p_stock2301");
        assert_eq!(param(&income, "scode"), Some("000651,000333"));
        assert_eq!(param(&income, "type"), Some("071001"));
        assert_eq!(param(&income, "source"), Some("033003"));
        assert_eq!(param(&income, "rdate"), Some("2018-12-31"));

        let balance = layout.statements(StatementKind::Balance, &codes, "2018-12-31");
        assert_eq!(balance.endpoint, "api/stock/p_stock2300");
        let cash = layout.statements(StatementKind::CashFlow, &codes, "2018-12-31");
        assert_eq!(cash.endpoint, "api/stock/p_stock2302");
    }

    #[test]
    fn test_classification_request() {
        let layout = CnInfoLayout::default();
        let request = layout.classification();
        assert_eq!(request.endpoint, "api/stock/p_public0004");
        assert_eq!(param(&request, "platetype"), Some("137002"));

        let dictionary = layout.classification_dictionary();
        assert_eq!(dictionary.rename("F009V"), Some("class_code"));
        assert_eq!(dictionary.rename("F006V"), Some("subclass_name"));
        assert_eq!(dictionary.len(), 6);
    }

    #[test]
    fn test_quote_request() {
        let layout = CnInfoLayout::default();
        let date = NaiveDate::from_ymd_opt(2019, 4, 30).unwrap();
        let request = layout.daily_quotes(&["000651".to_string()], date);
        assert_eq!(param(&request, "sdate"), Some("2019-04-30"));
        assert_eq!(param(&request, "edate"), Some("2019-04-30"));

        let dictionary = layout.quote_dictionary();
        assert_eq!(dictionary.rename("F002N"), Some("price"));
    }
}
