//! Parses the lines an FTP server returns for `LIST`.
//!
//! Servers are free to format these lines however they like. In practice they either mimic
//! `ls -l` or the MS-DOS `dir` output, so both are recognised. Lines in neither format are
//! skipped.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use derive_more::Display;

/// The kind of entry a listing line describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum EntryType {
    /// A regular file.
    #[display("file")]
    File,
    /// A directory.
    #[display("folder")]
    Folder,
    /// A symbolic link. Its target is not resolved, so a link is never a directory, even when
    /// it points at one. Removing a directory tree deletes such links instead of following them.
    #[display("link")]
    Link,
}

/// One parsed listing line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// The entry name, without the directory it was listed in.
    pub name: String,
    /// Size in bytes as reported by the server.
    pub size: u64,
    /// What kind of entry this is.
    pub kind: EntryType,
    /// Modification time, if the server reported one that could be parsed.
    pub modified: Option<DateTime<Utc>>,
}

impl RemoteEntry {
    /// True for directories. Links to directories are not directories here.
    pub fn is_dir(&self) -> bool {
        self.kind == EntryType::Folder
    }
}

/// Parses a single `LIST` line. Returns `None` for lines that are not entries (e.g. the `total`
/// header) and for the `.` and `..` pseudo entries.
pub fn parse_line(line: &str, now: DateTime<Utc>) -> Option<RemoteEntry> {
    let line = line.trim_end_matches(['\r', '\n']);
    let entry = parse_unix(line, now).or_else(|| parse_dos(line))?;
    match entry.name.as_str() {
        "" | "." | ".." => None,
        _ => Some(entry),
    }
}

/// Parses all lines of a listing, dropping the ones that do not describe an entry.
pub fn parse_listing<S: AsRef<str>>(lines: &[S], now: DateTime<Utc>) -> Vec<RemoteEntry> {
    lines.iter().filter_map(|l| parse_line(l.as_ref(), now)).collect()
}

// Splits off `n` whitespace separated fields and returns them with the untouched remainder, so
// names containing runs of spaces survive.
fn split_fields(line: &str, n: usize) -> Option<(Vec<&str>, &str)> {
    let mut rest = line.trim_start();
    let mut fields = Vec::with_capacity(n);
    for _ in 0..n {
        let end = rest.find(char::is_whitespace)?;
        fields.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }
    Some((fields, rest))
}

// drwxr-xr-x    1 owner    group           0 Jan 01 12:00 name
// -rw-r--r--    1 owner    group        1234 Mar 14  2023 name
// Some servers leave out the group column.
fn parse_unix(line: &str, now: DateTime<Utc>) -> Option<RemoteEntry> {
    let kind = match line.chars().next()? {
        'd' => EntryType::Folder,
        'l' => EntryType::Link,
        '-' => EntryType::File,
        _ => return None,
    };
    [8, 7].into_iter().find_map(|n| {
        let (fields, name) = split_fields(line, n)?;
        if fields[0].len() < 10 || name.is_empty() {
            return None;
        }
        let size = fields[n - 4].parse::<u64>().ok()?;
        let modified = unix_time(fields[n - 3], fields[n - 2], fields[n - 1], now);
        let name = match kind {
            EntryType::Link => name.split_once(" -> ").map_or(name, |(link, _)| link),
            _ => name,
        };
        Some(RemoteEntry {
            name: name.to_string(),
            size,
            kind,
            modified,
        })
    })
}

fn unix_time(month: &str, day: &str, time_or_year: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some((hour, minute)) = time_or_year.split_once(':') {
        let time = NaiveTime::from_hms_opt(hour.parse().ok()?, minute.parse().ok()?, 0)?;
        let date = NaiveDate::parse_from_str(&format!("{} {} {}", month, day, now.year()), "%b %d %Y").ok()?;
        let stamp = Utc.from_utc_datetime(&NaiveDateTime::new(date, time));
        // Recent entries leave out the year, which may then still be last year's.
        if stamp > now + chrono::Duration::days(1) {
            let date = NaiveDate::parse_from_str(&format!("{} {} {}", month, day, now.year() - 1), "%b %d %Y").ok()?;
            return Some(Utc.from_utc_datetime(&NaiveDateTime::new(date, time)));
        }
        Some(stamp)
    } else {
        let date = NaiveDate::parse_from_str(&format!("{} {} {}", month, day, time_or_year), "%b %d %Y").ok()?;
        Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
    }
}

// 01-16-24  02:15PM       <DIR>          folder name
// 01-16-24  02:15PM                 1234 file.txt
fn parse_dos(line: &str) -> Option<RemoteEntry> {
    let (fields, name) = split_fields(line, 3)?;
    if name.is_empty() {
        return None;
    }
    let date = NaiveDate::parse_from_str(fields[0], "%m-%d-%y").ok()?;
    let modified = NaiveTime::parse_from_str(fields[1], "%I:%M%p")
        .ok()
        .map(|time| Utc.from_utc_datetime(&NaiveDateTime::new(date, time)));
    let (kind, size) = if fields[2].eq_ignore_ascii_case("<DIR>") {
        (EntryType::Folder, 0)
    } else {
        (EntryType::File, fields[2].parse().ok()?)
    };
    Some(RemoteEntry {
        name: name.to_string(),
        size,
        kind,
        modified,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap()
    }

    #[rstest]
    #[case("drwxr-xr-x    1 ftp      ftp             0 Jan 01 12:00 photos", "photos", EntryType::Folder, 0)]
    #[case("-rw-r--r--    1 ftp      ftp          1234 Mar 14  2023 logo.png", "logo.png", EntryType::File, 1234)]
    #[case("-rw-r--r--    1 ftp          42 Mar 14  2023 nogroup.txt", "nogroup.txt", EntryType::File, 42)]
    #[case("lrwxrwxrwx    1 ftp      ftp            11 Mar 14  2023 latest -> logo.png", "latest", EntryType::Link, 11)]
    #[case("-rw-r--r--    1 ftp      ftp             3 Mar 14  2023 two  spaces.txt", "two  spaces.txt", EntryType::File, 3)]
    #[case("01-16-24  02:15PM       <DIR>          Old Stuff", "Old Stuff", EntryType::Folder, 0)]
    #[case("01-16-24  02:15PM                 1234 report.pdf", "report.pdf", EntryType::File, 1234)]
    fn parses_entries(#[case] line: &str, #[case] name: &str, #[case] kind: EntryType, #[case] size: u64) {
        let entry = parse_line(line, now()).unwrap();
        assert_eq!(entry.name, name);
        assert_eq!(entry.kind, kind);
        assert_eq!(entry.size, size);
    }

    #[rstest]
    #[case("total 12")]
    #[case("")]
    #[case("drwxr-xr-x    1 ftp      ftp             0 Jan 01 12:00 .")]
    #[case("drwxr-xr-x    1 ftp      ftp             0 Jan 01 12:00 ..")]
    #[case("garbage")]
    fn skips_non_entries(#[case] line: &str) {
        assert_eq!(parse_line(line, now()), None);
    }

    #[test]
    fn links_to_directories_are_not_directories() {
        let entry = parse_line("lrwxrwxrwx    1 ftp      ftp             6 Mar 14  2023 current -> photos", now()).unwrap();
        assert_eq!(entry.name, "current");
        assert_eq!(entry.kind, EntryType::Link);
        assert!(!entry.is_dir());
    }

    #[test]
    fn timestamps() {
        let entry = parse_line("-rw-r--r-- 1 ftp ftp 1 Mar 14 2023 a", now()).unwrap();
        assert_eq!(entry.modified, Some(Utc.with_ymd_and_hms(2023, 3, 14, 0, 0, 0).unwrap()));

        let entry = parse_line("-rw-r--r-- 1 ftp ftp 1 Jan 02 08:30 a", now()).unwrap();
        assert_eq!(entry.modified, Some(Utc.with_ymd_and_hms(2024, 1, 2, 8, 30, 0).unwrap()));

        // A date later this year must belong to last year.
        let entry = parse_line("-rw-r--r-- 1 ftp ftp 1 Dec 24 18:00 a", now()).unwrap();
        assert_eq!(entry.modified, Some(Utc.with_ymd_and_hms(2023, 12, 24, 18, 0, 0).unwrap()));

        let entry = parse_line("01-16-24  02:15PM 5 a", now()).unwrap();
        assert_eq!(entry.modified, Some(Utc.with_ymd_and_hms(2024, 1, 16, 14, 15, 0).unwrap()));
    }

    #[test]
    fn listing_keeps_entry_order() {
        let lines = vec![
            "total 2".to_string(),
            "drwxr-xr-x 1 ftp ftp 0 Jan 01 12:00 .".to_string(),
            "drwxr-xr-x 1 ftp ftp 0 Jan 01 12:00 b".to_string(),
            "-rw-r--r-- 1 ftp ftp 7 Jan 01 12:00 a.txt".to_string(),
        ];
        let entries = parse_listing(&lines, now());
        assert_eq!(entries.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(), vec!["b", "a.txt"]);
        assert_eq!(entries[0].kind.to_string(), "folder");
        assert_eq!(entries[1].kind.to_string(), "file");
    }
}
