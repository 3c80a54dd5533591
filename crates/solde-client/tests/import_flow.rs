use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde_json::Value;
use solde_client::commands::accounts::list_with_home_override;
use solde_client::commands::import::{ImportListOptions, ImportRunOptions, list_with_options, run_with_options};
use solde_client::setup::ensure_initialized_at;
use tempfile::tempdir;

const ACCT1_OFX: &str = "OFXHEADER:100\nDATA:OFXSGML\nVERSION:102\n\n\
<OFX><BANKMSGSRSV1><STMTTRNRS><STMTRS><CURDEF>EUR\n\
<BANKACCTFROM><ACCTID>acct1</BANKACCTFROM>\n\
<BANKTRANLIST>\n\
<STMTTRN><DTPOSTED>20240101<TRNAMT>1000.00<FITID>F1<NAME>SALARY</STMTTRN>\n\
<STMTTRN><DTPOSTED>20240102<TRNAMT>-42.10<FITID>F2<NAME>GROCERIES</STMTTRN>\n\
<STMTTRN><DTPOSTED>20240103<TRNAMT>-0.50<NAME>BANK FEE</STMTTRN>\n\
</BANKTRANLIST>\n\
<LEDGERBAL><BALAMT>957.40<DTASOF>20240103</LEDGERBAL>\n\
</STMTRS></STMTTRNRS></BANKMSGSRSV1></OFX>\n";

const ACCT1_LATER_OFX: &str = "OFXHEADER:100\nDATA:OFXSGML\nVERSION:102\n\n\
<OFX><BANKMSGSRSV1><STMTTRNRS><STMTRS><CURDEF>EUR\n\
<BANKACCTFROM><ACCTID>acct1</BANKACCTFROM>\n\
<BANKTRANLIST>\n\
<STMTTRN><DTPOSTED>20240102<TRNAMT>-42.10<FITID>F2<NAME>GROCERIES</STMTTRN>\n\
<STMTTRN><DTPOSTED>20240103<TRNAMT>-0.50<NAME>BANK FEE</STMTTRN>\n\
<STMTTRN><DTPOSTED>20240110<TRNAMT>-7.90<FITID>F3<NAME>BAKERY</STMTTRN>\n\
</BANKTRANLIST>\n\
<LEDGERBAL><BALAMT>949.50<DTASOF>20240110</LEDGERBAL>\n\
</STMTRS></STMTTRNRS></BANKMSGSRSV1></OFX>\n";

const ACCT1_CSV: &str = "Date;Amount;Label\n\
03/01/2024;-0,50;BANK FEE\n\
04/01/2024;-15,00;CINEMA\n\
05/01/2024;200,00;REFUND\n";

const CONFIG: &str = "[csv_profiles.mybank]\n\
account_id = \"acct1\"\n\
date_column = \"Date\"\n\
amount_column = \"Amount\"\n\
description_column = \"Label\"\n\
date_format = \"%d/%m/%Y\"\n\
delimiter = \";\"\n";

fn write_file(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    assert!(fs::write(&path, body).is_ok());
    path
}

fn import(home: &Path, paths: Vec<PathBuf>, profile: Option<&str>, dry_run: bool) -> solde_client::ClientResult<Value> {
    run_with_options(ImportRunOptions {
        paths,
        profile: profile.map(str::to_string),
        dry_run,
        home_override: Some(home),
        ..ImportRunOptions::default()
    })
    .map(|success| success.data)
}

fn count_rows(home: &Path, table: &str) -> i64 {
    let connection = Connection::open(home.join("solde.db"));
    assert!(connection.is_ok());
    match connection {
        Ok(conn) => conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get::<_, i64>(0))
            .unwrap_or(-1),
        Err(_) => -1,
    }
}

#[test]
fn ofx_then_reimport_then_overlapping_csv() {
    let temp = tempdir();
    assert!(temp.is_ok());
    if let Ok(temp_dir) = temp {
        let home = temp_dir.path();
        write_file(home, "config.toml", CONFIG);
        let ofx = write_file(home, "acct1.ofx", ACCT1_OFX);
        let csv = write_file(home, "acct1.csv", ACCT1_CSV);

        let first = import(home, vec![ofx.clone()], None, false);
        assert!(first.is_ok());
        if let Ok(data) = first {
            assert_eq!(data["inserted"], 3);
            assert_eq!(data["skipped"], 0);
            assert_eq!(data["files"][0]["format"], "ofx");
            assert_eq!(data["files"][0]["statement_balances_recorded"], 1);
            assert!(data["files"][0]["import_id"].as_str().is_some_and(|id| id.starts_with("imp_")));
        }

        let again = import(home, vec![ofx], None, false);
        assert!(again.is_ok());
        if let Ok(data) = again {
            assert_eq!(data["inserted"], 0);
            assert_eq!(data["skipped"], 3);
            let matched = data["files"][0]["duplicates_preview"]
                .as_array()
                .map(|rows| {
                    rows.iter()
                        .map(|row| row["matched_on"].as_str().unwrap_or_default().to_string())
                        .collect::<Vec<String>>()
                })
                .unwrap_or_default();
            assert_eq!(matched, vec!["source_ref", "source_ref", "fingerprint"]);
        }

        let cross = import(home, vec![csv], Some("mybank"), false);
        assert!(cross.is_ok());
        if let Ok(data) = cross {
            assert_eq!(data["inserted"], 2);
            assert_eq!(data["skipped"], 1);
            let duplicate = &data["files"][0]["duplicates_preview"][0];
            assert_eq!(duplicate["reason"], "existing_store");
            assert_eq!(duplicate["source_row"], 2);
            assert_eq!(duplicate["transaction"]["description"], "BANK FEE");
        }

        assert_eq!(count_rows(home, "transactions"), 5);
        assert_eq!(count_rows(home, "import_runs"), 3);

        let connection = Connection::open(home.join("solde.db"));
        assert!(connection.is_ok());
        if let Ok(conn) = connection {
            let statement = conn.prepare("PRAGMA foreign_key_check");
            assert!(statement.is_ok());
            if let Ok(mut check) = statement {
                let dangling = check.query_map([], |_row| Ok(())).map(|rows| rows.count());
                assert!(matches!(dangling, Ok(0)));
            }
        }
    }
}

#[test]
fn overlapping_ofx_exports_only_add_new_rows() {
    let temp = tempdir();
    assert!(temp.is_ok());
    if let Ok(temp_dir) = temp {
        let home = temp_dir.path();
        let early = write_file(home, "early.ofx", ACCT1_OFX);
        let later = write_file(home, "later.ofx", ACCT1_LATER_OFX);

        let result = import(home, vec![early, later], None, false);
        assert!(result.is_ok());
        if let Ok(data) = result {
            assert_eq!(data["inserted"], 4);
            assert_eq!(data["skipped"], 2);
            assert_eq!(data["files"][1]["new_rows_preview"][0]["description"], "BAKERY");
            assert_eq!(data["files"][1]["new_rows_preview"][0]["amount_cents"], -790);
        }
        assert_eq!(count_rows(home, "statement_balances"), 2);
    }
}

#[test]
fn repeated_row_inside_one_file_is_a_batch_duplicate() {
    let temp = tempdir();
    assert!(temp.is_ok());
    if let Ok(temp_dir) = temp {
        let home = temp_dir.path();
        write_file(home, "config.toml", CONFIG);
        let csv = write_file(
            home,
            "twice.csv",
            "Date;Amount;Label\n06/01/2024;-3,20;COFFEE\n06/01/2024;-3,20;COFFEE\n",
        );

        let result = import(home, vec![csv], Some("mybank"), false);
        assert!(result.is_ok());
        if let Ok(data) = result {
            assert_eq!(data["inserted"], 1);
            assert_eq!(data["skipped"], 1);
            assert_eq!(data["files"][0]["duplicate_summary"]["batch"], 1);
            assert_eq!(data["files"][0]["duplicates_preview"][0]["reason"], "batch");
            assert_eq!(data["files"][0]["duplicates_preview"][0]["source_row"], 3);
        }
    }
}

#[test]
fn bad_csv_row_rejects_the_whole_file() {
    let temp = tempdir();
    assert!(temp.is_ok());
    if let Ok(temp_dir) = temp {
        let home = temp_dir.path();
        write_file(home, "config.toml", CONFIG);
        let csv = write_file(
            home,
            "bad.csv",
            "Date;Amount;Label\n01/01/2024;10,00;OK\n02/01/2024;ten;BROKEN\n31/02/2024;1,00;NO SUCH DAY\n",
        );

        let result = import(home, vec![csv], Some("mybank"), false);
        assert!(result.is_err());
        if let Err(error) = result {
            assert_eq!(error.code, "import_parse_failed");
            assert!(!error.is_store_error());
            let issues = error
                .data
                .as_ref()
                .and_then(|data| data["issues"].as_array().cloned())
                .unwrap_or_default();
            let rows = issues
                .iter()
                .map(|issue| (issue["row"].as_i64().unwrap_or_default(), issue["field"].as_str().unwrap_or_default().to_string()))
                .collect::<Vec<(i64, String)>>();
            assert_eq!(
                rows,
                vec![(3, "Amount".to_string()), (4, "Date".to_string())]
            );
        }

        assert_eq!(count_rows(home, "transactions"), 0);
        assert_eq!(count_rows(home, "accounts"), 0);
        assert_eq!(count_rows(home, "import_runs"), 0);
    }
}

#[test]
fn truncated_ofx_export_imports_nothing() {
    let temp = tempdir();
    assert!(temp.is_ok());
    if let Ok(temp_dir) = temp {
        let home = temp_dir.path();
        let cut = ACCT1_OFX.find("<STMTTRN><DTPOSTED>20240103").unwrap_or(ACCT1_OFX.len());
        let truncated = format!("{}<STMTTRN><DTPOSTED>20240103<TRNAMT>-0.50", &ACCT1_OFX[..cut]);
        let ofx = write_file(home, "cut.ofx", &truncated);

        let result = import(home, vec![ofx], None, false);
        assert!(result.is_err());
        if let Err(error) = result {
            assert_eq!(error.code, "import_parse_failed");
        }

        assert_eq!(count_rows(home, "transactions"), 0);
        assert_eq!(count_rows(home, "import_runs"), 0);
    }
}

#[test]
fn dry_run_reports_counts_but_writes_nothing() {
    let temp = tempdir();
    assert!(temp.is_ok());
    if let Ok(temp_dir) = temp {
        let home = temp_dir.path();
        let ofx = write_file(home, "acct1.ofx", ACCT1_OFX);

        let result = import(home, vec![ofx], None, true);
        assert!(result.is_ok());
        if let Ok(data) = result {
            assert_eq!(data["inserted"], 3);
            assert_eq!(data["files"][0]["dry_run"], true);
            assert!(data["files"][0].get("import_id").is_none());
            assert_eq!(
                data["message"],
                "Dry run: 3 new, 0 duplicate. No rows were written."
            );
        }

        assert_eq!(count_rows(home, "transactions"), 0);
        assert_eq!(count_rows(home, "statement_balances"), 0);
        assert_eq!(count_rows(home, "import_runs"), 0);
    }
}

#[test]
fn failed_insert_rolls_back_every_write() {
    let temp = tempdir();
    assert!(temp.is_ok());
    if let Ok(temp_dir) = temp {
        let home = temp_dir.path();
        let context = ensure_initialized_at(home);
        assert!(context.is_ok());

        let connection = Connection::open(home.join("solde.db"));
        assert!(connection.is_ok());
        if let Ok(conn) = connection {
            let trigger = conn.execute_batch(
                "CREATE TRIGGER fail_on_fee BEFORE INSERT ON transactions
                 WHEN NEW.description = 'BANK FEE'
                 BEGIN SELECT RAISE(ABORT, 'forced failure'); END;",
            );
            assert!(trigger.is_ok());
        }

        let ofx = write_file(home, "acct1.ofx", ACCT1_OFX);
        let result = import(home, vec![ofx], None, false);
        assert!(result.is_err());

        assert_eq!(count_rows(home, "transactions"), 0);
        assert_eq!(count_rows(home, "accounts"), 0);
        assert_eq!(count_rows(home, "statement_balances"), 0);
        assert_eq!(count_rows(home, "import_runs"), 0);
    }
}

#[test]
fn later_file_failure_names_completed_imports() {
    let temp = tempdir();
    assert!(temp.is_ok());
    if let Ok(temp_dir) = temp {
        let home = temp_dir.path();
        write_file(home, "config.toml", CONFIG);
        let ofx = write_file(home, "acct1.ofx", ACCT1_OFX);
        let bad = write_file(home, "bad.csv", "Date;Amount;Label\n01/01/2024;x;BROKEN\n");

        let result = import(home, vec![ofx, bad], Some("mybank"), false);
        assert!(result.is_err());
        if let Err(error) = result {
            assert_eq!(error.code, "import_parse_failed");
            let data = error.data.unwrap_or(Value::Null);
            assert!(data["failed_path"].as_str().is_some_and(|path| path.ends_with("bad.csv")));
            assert_eq!(data["completed_imports"].as_array().map(Vec::len), Some(1));
            assert_eq!(data["completed_imports"][0]["inserted"], 3);
            assert!(data["issues"].as_array().is_some_and(|issues| !issues.is_empty()));
        }

        assert_eq!(count_rows(home, "transactions"), 3);
    }
}

#[test]
fn unknown_extension_needs_explicit_format() {
    let temp = tempdir();
    assert!(temp.is_ok());
    if let Ok(temp_dir) = temp {
        let home = temp_dir.path();
        let export = write_file(home, "export.txt", ACCT1_OFX);

        let inferred = import(home, vec![export.clone()], None, false);
        assert!(inferred.is_err());
        if let Err(error) = inferred {
            assert_eq!(error.code, "malformed_input");
        }

        let explicit = run_with_options(ImportRunOptions {
            paths: vec![export],
            format: Some("ofx".to_string()),
            home_override: Some(home),
            ..ImportRunOptions::default()
        });
        assert!(explicit.is_ok());
    }
}

#[test]
fn import_list_shows_newest_first_and_registers_accounts() {
    let temp = tempdir();
    assert!(temp.is_ok());
    if let Ok(temp_dir) = temp {
        let home = temp_dir.path();
        let early = write_file(home, "early.ofx", ACCT1_OFX);
        let later = write_file(home, "later.ofx", ACCT1_LATER_OFX);
        assert!(import(home, vec![early], None, false).is_ok());

        let connection = Connection::open(home.join("solde.db"));
        assert!(connection.is_ok());
        if let Ok(conn) = connection {
            let backdated =
                conn.execute("UPDATE import_runs SET created_at = '2020-01-01T00:00:00.000Z'", []);
            assert!(backdated.is_ok());
        }
        assert!(import(home, vec![later], None, false).is_ok());

        let listed = list_with_options(ImportListOptions {
            home_override: Some(home),
        });
        assert!(listed.is_ok());
        if let Ok(success) = listed {
            assert_eq!(success.command, "import list");
            let rows = success.data["rows"].as_array().cloned().unwrap_or_default();
            assert_eq!(rows.len(), 2);
            assert!(rows[0]["source_path"].as_str().is_some_and(|path| path.ends_with("later.ofx")));
            assert_eq!(rows[1]["created_at"], "2020-01-01T00:00:00.000Z");
        }

        let accounts = list_with_home_override(Some(home));
        assert!(accounts.is_ok());
        if let Ok(success) = accounts {
            let account = &success.data["accounts"][0];
            assert_eq!(account["account_id"], "acct1");
            assert_eq!(account["transaction_count"], 4);
            assert_eq!(account["current_balance_cents"], 94_950);
            assert_eq!(account["latest_statement"]["balance_cents"], 94_950);
        }
    }
}
