use crate::format::{format_day, format_duration_ms, format_hour_minute};
use crate::history::UserStats;
use chrono::NaiveDate;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("no hay estadísticas para exportar")]
    NoData,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

/// One spreadsheet row: a single completed session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRow {
    pub usuario: String,
    pub fecha: String,
    pub inicio: String,
    pub fin: String,
    pub duracion: String,
    pub canal: String,
}

const HEADER: [&str; 6] = ["Usuario", "Fecha", "Hora inicio", "Hora fin", "Duración", "Canal"];
const COLUMN_WIDTHS: [u32; 6] = [25, 25, 15, 15, 15, 20];

/// Flatten a history snapshot into rows, one per session, keeping the
/// snapshot's user order and each user's session order. `resolve` maps a user
/// id to a display name; unresolved users fall back to the raw id.
pub fn session_rows(
    snapshot: &[(u64, UserStats)],
    resolve: impl Fn(u64) -> Option<String>,
) -> Vec<SessionRow> {
    let mut rows = Vec::new();
    for (user_id, stats) in snapshot {
        let usuario = resolve(*user_id).unwrap_or_else(|| user_id.to_string());
        for session in &stats.sessions {
            rows.push(SessionRow {
                usuario: usuario.clone(),
                fecha: format_day(&session.joined_at),
                inicio: format_hour_minute(&session.joined_at),
                fin: format_hour_minute(&session.left_at),
                duracion: format_duration_ms(session.duration_ms),
                canal: session.channel_name.clone(),
            });
        }
    }
    rows
}

/// Build the `.xlsx` bytes for the given rows.
///
/// An `.xlsx` file is a ZIP archive of XML parts; the workbook is assembled
/// by hand with a single worksheet using inline strings.
pub fn build_workbook(rows: &[SessionRow]) -> Result<Vec<u8>, ExportError> {
    if rows.is_empty() {
        return Err(ExportError::NoData);
    }

    let mut buf = Vec::new();
    {
        let cursor = Cursor::new(&mut buf);
        let mut zip = zip::ZipWriter::new(cursor);
        let options = zip::write::SimpleFileOptions::default();

        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(CONTENT_TYPES_XML.as_bytes())?;

        zip.start_file("_rels/.rels", options)?;
        zip.write_all(RELS_XML.as_bytes())?;

        zip.start_file("xl/workbook.xml", options)?;
        zip.write_all(WORKBOOK_XML.as_bytes())?;

        zip.start_file("xl/_rels/workbook.xml.rels", options)?;
        zip.write_all(WORKBOOK_RELS_XML.as_bytes())?;

        zip.start_file("xl/worksheets/sheet1.xml", options)?;
        zip.write_all(sheet_xml(rows).as_bytes())?;

        zip.finish()?;
    }
    Ok(buf)
}

/// Path of the daily spreadsheet, one file per calendar day.
pub fn daily_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("estadisticas_voz_{}.xlsx", date.format("%Y-%m-%d")))
}

/// Rewrite today's spreadsheet wholesale.
pub fn write_daily(dir: &Path, date: NaiveDate, rows: &[SessionRow]) -> Result<PathBuf, ExportError> {
    let bytes = build_workbook(rows)?;
    std::fs::create_dir_all(dir)?;
    let path = daily_path(dir, date);
    std::fs::write(&path, &bytes)?;
    Ok(path)
}

fn sheet_xml(rows: &[SessionRow]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
"#,
    );

    xml.push_str("<cols>");
    for (i, width) in COLUMN_WIDTHS.iter().enumerate() {
        xml.push_str(&format!(
            r#"<col min="{0}" max="{0}" width="{1}" customWidth="1"/>"#,
            i + 1,
            width
        ));
    }
    xml.push_str("</cols>\n<sheetData>\n");

    push_row(&mut xml, &HEADER.map(String::from));
    for row in rows {
        push_row(
            &mut xml,
            &[
                row.usuario.clone(),
                row.fecha.clone(),
                row.inicio.clone(),
                row.fin.clone(),
                row.duracion.clone(),
                row.canal.clone(),
            ],
        );
    }

    xml.push_str("</sheetData>\n</worksheet>");
    xml
}

fn push_row(xml: &mut String, cells: &[String; 6]) {
    xml.push_str("<row>");
    for cell in cells {
        xml.push_str(&format!(
            r#"<c t="inlineStr"><is><t>{}</t></is></c>"#,
            escape_xml(cell)
        ));
    }
    xml.push_str("</row>\n");
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
  <Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
</Types>"#;

const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

const WORKBOOK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets>
    <sheet name="Estadísticas de Voz" sheetId="1" r:id="rId1"/>
  </sheets>
</workbook>"#;

const WORKBOOK_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#;
