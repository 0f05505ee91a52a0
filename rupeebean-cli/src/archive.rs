//! Filing identified statements under `DEST/<account path>/<date>.<name>`.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use rupeebean_ingest::importer::Importer;
use rupeebean_ingest::source::SourceFile;

/// `Assets:Savings:HDFC` becomes `dest/Assets/Savings/HDFC/2024-01-31.name`.
pub fn destination(dest: &Path, account: &str, date: NaiveDate, name: &str) -> PathBuf {
    let mut out = dest.to_path_buf();
    for part in account.split(':').filter(|p| !p.is_empty()) {
        out.push(part);
    }
    out.push(format!("{}.{name}", date.format("%Y-%m-%d")));
    out
}

fn modified_date(path: &Path) -> Result<NaiveDate> {
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("stat {}", path.display()))?;
    Ok(DateTime::<Local>::from(modified).date_naive())
}

/// Where `importer` would file `file`. The date falls back to the file's
/// modification date and the name to the file's own name.
pub fn plan(importer: &dyn Importer, file: &SourceFile, dest: &Path) -> Result<PathBuf> {
    let account = importer.file_account(file)?;
    let date = match importer.file_date(file)? {
        Some(d) => d,
        None => modified_date(file.path())?,
    };
    let name = importer.file_name(file)?.unwrap_or_else(|| file.name());
    Ok(destination(dest, &account, date, &name))
}

/// Move `from` to `to`, creating directories. Never overwrites.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        bail!("{} already exists", to.display());
    }
    if let Some(dir) = to.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    if let Err(e) = fs::rename(from, to) {
        // Across filesystems rename fails; copy then remove.
        warn!(error = %e, "rename failed, copying instead");
        fs::copy(from, to).with_context(|| format!("copy {} to {}", from.display(), to.display()))?;
        fs::remove_file(from).with_context(|| format!("remove {}", from.display()))?;
    }
    info!(from = %from.display(), to = %to.display(), "archived");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rupeebean_core::ledger::Directive;

    struct Fixed {
        date: Option<NaiveDate>,
        name: Option<String>,
    }

    impl Importer for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn identify(&self, _file: &SourceFile) -> bool {
            true
        }

        fn extract(&self, _file: &SourceFile) -> Result<Vec<Directive>> {
            Ok(Vec::new())
        }

        fn file_account(&self, _file: &SourceFile) -> Result<String> {
            Ok("Liabilities:CreditCard:ICICI".to_string())
        }

        fn file_date(&self, _file: &SourceFile) -> Result<Option<NaiveDate>> {
            Ok(self.date)
        }

        fn file_name(&self, _file: &SourceFile) -> Result<Option<String>> {
            Ok(self.name.clone())
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_destination() {
        let p = destination(Path::new("/docs"), "Assets:Savings:HDFC", d(2024, 1, 31), "stmt.pdf");
        assert_eq!(p, PathBuf::from("/docs/Assets/Savings/HDFC/2024-01-31.stmt.pdf"));
    }

    #[test]
    fn test_plan_uses_importer_date_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("download.xls");
        fs::write(&src, "x").unwrap();
        let imp = Fixed {
            date: Some(d(2024, 2, 15)),
            name: Some("ICICI_Statement.xls".to_string()),
        };
        let p = plan(&imp, &SourceFile::new(src.clone()), Path::new("/docs")).unwrap();
        assert_eq!(
            p,
            PathBuf::from("/docs/Liabilities/CreditCard/ICICI/2024-02-15.ICICI_Statement.xls")
        );
    }

    #[test]
    fn test_plan_falls_back_to_file_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("download.xls");
        fs::write(&src, "x").unwrap();
        let imp = Fixed { date: None, name: None };
        let p = plan(&imp, &SourceFile::new(src.clone()), Path::new("/docs")).unwrap();
        let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
        assert!(p.ends_with(format!("ICICI/{today}.download.xls")));
    }

    #[test]
    fn test_move_file_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.csv");
        fs::write(&src, "a").unwrap();
        let to = dir.path().join("Assets").join("Bank").join("2024-01-01.a.csv");
        move_file(&src, &to).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "a");

        fs::write(&src, "b").unwrap();
        assert!(move_file(&src, &to).is_err());
        assert!(src.exists());
    }
}
