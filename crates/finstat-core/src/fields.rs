//! Domain column names shared by the normalizer, the merger and the ratio engine.
//!
//! Name dictionaries translate provider field codes into these names. Anything
//! a dictionary maps to a name not listed here is carried through untouched.

/// Entity identifier.
pub const CODE: &str = "code";
/// Entity display name.
pub const NAME: &str = "name";
/// Reporting period end date, ISO `YYYY-MM-DD`.
pub const REPORT_PERIOD: &str = "report_period";

/// Composite natural key of a statement row.
pub const KEY: [&str; 3] = [CODE, NAME, REPORT_PERIOD];

/// Announcement date.
pub const ANNOUNCEMENT_DATE: &str = "announcement_date";
/// Cutoff date.
pub const CUTOFF_DATE: &str = "cutoff_date";
/// Consolidation type code.
pub const CONSOLIDATION_CODE: &str = "consolidation_code";
/// Consolidation type.
pub const CONSOLIDATION_TYPE: &str = "consolidation_type";
/// Report source code.
pub const REPORT_SOURCE_CODE: &str = "report_source_code";
/// Report source.
pub const REPORT_SOURCE: &str = "report_source";
/// Reporting institution.
pub const INSTITUTION: &str = "institution";
/// Period start date.
pub const START_DATE: &str = "start_date";

/// Provenance columns dropped after merging.
pub const PROVENANCE: [&str; 8] = [
    ANNOUNCEMENT_DATE,
    CUTOFF_DATE,
    CONSOLIDATION_CODE,
    CONSOLIDATION_TYPE,
    REPORT_SOURCE_CODE,
    REPORT_SOURCE,
    INSTITUTION,
    START_DATE,
];

// Income statement
/// Total operating revenue.
pub const REVENUE: &str = "revenue";
/// Total operating cost.
pub const TOTAL_COST: &str = "total_cost";
/// Cost of sales.
pub const OPERATING_COST: &str = "operating_cost";
/// Taxes and surcharges.
pub const TAXES_AND_SURCHARGES: &str = "taxes_and_surcharges";
/// Selling expense.
pub const SELLING_EXPENSE: &str = "selling_expense";
/// Administrative expense.
pub const ADMIN_EXPENSE: &str = "admin_expense";
/// Research and development expense.
pub const RD_EXPENSE: &str = "rd_expense";
/// Financial expense.
pub const FINANCIAL_EXPENSE: &str = "financial_expense";
/// Operating profit.
pub const OPERATING_PROFIT: &str = "operating_profit";
/// Total profit before tax.
pub const TOTAL_PROFIT: &str = "total_profit";
/// Net profit.
pub const NET_PROFIT: &str = "net_profit";
/// Net profit attributable to shareholders of the parent.
pub const PARENT_NET_PROFIT: &str = "parent_net_profit";

// Balance sheet
/// Total assets.
pub const TOTAL_ASSETS: &str = "total_assets";
/// Total owners' equity.
pub const TOTAL_EQUITY: &str = "total_equity";
/// Share capital (number of shares).
pub const SHARE_CAPITAL: &str = "share_capital";

/// Itemized cost components of [`TOTAL_COST`].
pub const ITEMIZED_COSTS: [&str; 6] = [
    OPERATING_COST,
    TAXES_AND_SURCHARGES,
    SELLING_EXPENSE,
    ADMIN_EXPENSE,
    RD_EXPENSE,
    FINANCIAL_EXPENSE,
];

// Catalog
/// Industry class code.
pub const CLASS_CODE: &str = "class_code";
/// Industry class name.
pub const CLASS_NAME: &str = "class_name";
/// Industry subclass code.
pub const SUBCLASS_CODE: &str = "subclass_code";
/// Industry subclass name.
pub const SUBCLASS_NAME: &str = "subclass_name";

// Market data
/// Close price joined for valuation ratios.
pub const PRICE: &str = "price";

/// Returns true if the column holds text rather than amounts.
#[must_use]
pub fn is_text(column: &str) -> bool {
    KEY.contains(&column)
        || PROVENANCE.contains(&column)
        || matches!(
            column,
            CLASS_CODE | CLASS_NAME | SUBCLASS_CODE | SUBCLASS_NAME
        )
}
