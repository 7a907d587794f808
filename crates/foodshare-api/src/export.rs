//! CSV and JSON report downloads.

use axum::{
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;

use foodshare_types::api::ExportEnvelope;
use foodshare_types::enums::{ExportFormat, ReportType};
use foodshare_types::reports::ReportRecord;

use foodshare_db::models::now;
use foodshare_db::reports::ReportRange;

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn csv_line(values: &[String]) -> String {
    values
        .iter()
        .map(|v| csv_quote(v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Header row followed by one line per record, each `\r\n` terminated.
pub fn to_csv<R: ReportRecord>(rows: &[R]) -> String {
    let headers: Vec<String> = R::HEADERS.iter().map(|h| h.to_string()).collect();
    let mut out = csv_line(&headers);
    out.push_str("\r\n");
    for row in rows {
        out.push_str(&csv_line(&row.fields()));
        out.push_str("\r\n");
    }
    out
}

pub fn to_json<R: ReportRecord>(
    report_type: ReportType,
    range: ReportRange,
    rows: &[R],
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&ExportEnvelope {
        report_type,
        start_date: range.start,
        end_date: range.end,
        generated_at: now(),
        total_records: rows.len(),
        data: rows,
    })
}

pub fn file_name(report_type: ReportType, format: ExportFormat, day: NaiveDate) -> String {
    format!(
        "{}_report_{}.{}",
        report_type,
        day.format("%Y-%m-%d"),
        format.as_str()
    )
}

/// Render rows in the requested format as an attachment response.
pub fn download<R: ReportRecord>(
    report_type: ReportType,
    format: ExportFormat,
    range: ReportRange,
    today: NaiveDate,
    rows: &[R],
) -> anyhow::Result<Response> {
    let (body, content_type) = match format {
        ExportFormat::Csv => (to_csv(rows), "text/csv; charset=utf-8"),
        ExportFormat::Json => (to_json(report_type, range, rows)?, "application/json"),
    };
    let disposition = format!(
        "attachment; filename=\"{}\"",
        file_name(report_type, format, today)
    );
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CONTENT_DISPOSITION, HeaderValue::from_str(&disposition)?),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use foodshare_types::enums::{DonationStatus, Role, UserStatus};
    use foodshare_types::reports::{DonationReportRow, UserReportRow};

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 4, 2)
            .unwrap()
            .and_hms_opt(8, 15, 0)
            .unwrap()
    }

    fn range() -> ReportRange {
        ReportRange {
            start: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 4, 30).unwrap(),
        }
    }

    #[test]
    fn quoting_only_when_needed() {
        assert_eq!(csv_quote("plain"), "plain");
        assert_eq!(csv_quote("a,b"), "\"a,b\"");
        assert_eq!(csv_quote("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_quote("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn csv_rows_match_header_width() {
        let rows = vec![
            DonationReportRow {
                id: 1,
                title: "Bread, sourdough".into(),
                donor: "Ana \"Nanay\" Cruz".into(),
                food_type: "bakery".into(),
                status: DonationStatus::Available,
                views: 3,
                created_at: ts(),
            },
            DonationReportRow {
                id: 2,
                title: "Rice".into(),
                donor: "Ben".into(),
                food_type: "grains".into(),
                status: DonationStatus::Claimed,
                views: 0,
                created_at: ts(),
            },
        ];
        let csv = to_csv(&rows);
        let lines: Vec<_> = csv.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "ID,Title,Donor,Food Type,Status,Views,Created Date");
        assert_eq!(
            lines[1],
            "1,\"Bread, sourdough\",\"Ana \"\"Nanay\"\" Cruz\",bakery,available,3,2025-04-02 08:15"
        );
        assert_eq!(lines[2], "2,Rice,Ben,grains,claimed,0,2025-04-02 08:15");
    }

    #[test]
    fn empty_report_is_header_only() {
        let csv = to_csv::<UserReportRow>(&[]);
        assert_eq!(csv, "ID,Name,Email,Role,Status,Registration Date,Last Login\r\n");
    }

    #[test]
    fn json_envelope_counts_records() {
        let rows = vec![UserReportRow {
            id: 1,
            name: "Ana".into(),
            email: "ana@example.com".into(),
            role: Role::Resident,
            status: UserStatus::Approved,
            registered_at: ts(),
            last_activity: ts(),
        }];
        let body = to_json(ReportType::Users, range(), &rows).unwrap();
        let v: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["report_type"], "users");
        assert_eq!(v["start_date"], "2025-04-01");
        assert_eq!(v["end_date"], "2025-04-30");
        assert_eq!(v["total_records"], 1);
        assert_eq!(v["data"][0]["email"], "ana@example.com");
    }

    #[test]
    fn attachment_names() {
        let day = NaiveDate::from_ymd_opt(2025, 4, 30).unwrap();
        assert_eq!(
            file_name(ReportType::Donations, ExportFormat::Csv, day),
            "donations_report_2025-04-30.csv"
        );
        assert_eq!(
            file_name(ReportType::Engagement, ExportFormat::Json, day),
            "engagement_report_2025-04-30.json"
        );
    }
}
