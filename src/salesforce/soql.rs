//! The fixed case extraction query.

/// Full extraction of one organization's cases. Not parameterized.
pub const CASES_QUERY: &str = "SELECT CaseNumber, CreatedDate, ClosedDate, Status, Priority, \
Organization__c, ads_resourceman__Related_Service__c, Description \
FROM Case WHERE Organization__c = 'Houston Food Bank'";

/// Columns selected by [`CASES_QUERY`], in CSV column order. Query results
/// must come back with exactly these fields.
pub const CASE_COLUMNS: &[&str] = &[
    "CaseNumber",
    "CreatedDate",
    "ClosedDate",
    "Status",
    "Priority",
    "Organization__c",
    "ads_resourceman__Related_Service__c",
    "Description",
];
