//! Local fallback document rendering.
//!
//! When the external document renderer is unreachable the pipeline still
//! has to finish with valid artifacts, so this module writes the DOCX and
//! PPTX itself from packaged Office Open XML part templates. Output is
//! intentionally plainer than the service's (no embedded images); degraded
//! output is acceptable, a failed run is not.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::enrich::TIER_COLUMN;
use crate::error::{Error, Result};
use crate::narrative::NarrativeSection;
use crate::table::Table;

pub const DOCX_FILE_NAME: &str = "IT_Current_Status_Assessment_Report.docx";
pub const PPTX_FILE_NAME: &str = "IT_Current_Status_Executive_Report.pptx";

/// Everything the local renderer needs from the run.
pub struct RenderInputs<'a> {
    pub session_id: &'a str,
    pub hw: &'a Table,
    pub sw: &'a Table,
    pub charts: &'a BTreeMap<String, PathBuf>,
    pub sections: &'a [NarrativeSection],
}

/// Render both artifacts into `dir`, returning (docx, pptx) paths.
pub fn render_locally(dir: &Path, inputs: &RenderInputs<'_>) -> Result<(PathBuf, PathBuf)> {
    let docx = dir.join(DOCX_FILE_NAME);
    let pptx = dir.join(PPTX_FILE_NAME);
    write_docx(&docx, inputs)?;
    write_pptx(&pptx, inputs)?;
    Ok((docx, pptx))
}

// --- DOCX -----------------------------------------------------------------

const DOCX_CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
</Types>"#;

const DOCX_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#;

fn write_docx(path: &Path, inputs: &RenderInputs<'_>) -> Result<()> {
    let mut body = String::new();
    heading(&mut body, "IT Infrastructure Current Status Report", 0);
    heading(&mut body, "Session ID", 1);
    paragraph(&mut body, inputs.session_id);

    heading(&mut body, "Hardware Summary", 1);
    table_or_placeholder(&mut body, inputs.hw, "No hardware data available.");
    heading(&mut body, "Software Summary", 1);
    table_or_placeholder(&mut body, inputs.sw, "No software data available.");

    heading(&mut body, "Assessment Narrative", 1);
    for section in inputs.sections {
        heading(&mut body, section.title, 2);
        for line in section.content.split("\n\n") {
            paragraph(&mut body, line);
        }
    }

    heading(&mut body, "Charts & Visualizations", 1);
    if inputs.charts.is_empty() {
        paragraph(&mut body, "No charts were generated.");
    }
    for name in inputs.charts.keys() {
        paragraph(&mut body, &format!("Chart: {name}"));
    }

    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>{body}<w:sectPr/></w:body></w:document>"#
    );

    write_package(
        path,
        &[
            ("[Content_Types].xml", DOCX_CONTENT_TYPES.to_string()),
            ("_rels/.rels", DOCX_RELS.to_string()),
            ("word/document.xml", document),
        ],
    )
}

fn heading(body: &mut String, text: &str, level: u8) {
    let style = if level == 0 {
        "Title".to_string()
    } else {
        format!("Heading{level}")
    };
    body.push_str(&format!(
        "<w:p><w:pPr><w:pStyle w:val=\"{style}\"/></w:pPr>\
         <w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>",
        escape(text)
    ));
}

fn paragraph(body: &mut String, text: &str) {
    body.push_str(&format!(
        "<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>",
        escape(text)
    ));
}

fn table_or_placeholder(body: &mut String, table: &Table, placeholder: &str) {
    if table.is_empty() {
        paragraph(body, placeholder);
        return;
    }
    body.push_str("<w:tbl><w:tblPr><w:tblBorders>\
        <w:top w:val=\"single\"/><w:bottom w:val=\"single\"/>\
        <w:left w:val=\"single\"/><w:right w:val=\"single\"/>\
        <w:insideH w:val=\"single\"/><w:insideV w:val=\"single\"/>\
        </w:tblBorders></w:tblPr>");
    table_row(body, table.columns().iter().map(String::as_str));
    for row in 0..table.row_count() {
        let columns: Vec<&str> = table
            .columns()
            .iter()
            .map(String::as_str)
            .collect();
        let cells: Vec<String> = columns
            .iter()
            .map(|c| table.get(row, c).unwrap_or("").to_string())
            .collect();
        table_row(body, cells.iter().map(String::as_str));
    }
    body.push_str("</w:tbl>");
}

fn table_row<'a>(body: &mut String, cells: impl Iterator<Item = &'a str>) {
    body.push_str("<w:tr>");
    for cell in cells {
        body.push_str(&format!(
            "<w:tc><w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p></w:tc>",
            escape(cell)
        ));
    }
    body.push_str("</w:tr>");
}

// --- PPTX -----------------------------------------------------------------

const PPTX_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/>
</Relationships>"#;

const SLIDE_MASTER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldMaster xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
<p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld>
<p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/>
<p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst>
</p:sldMaster>"#;

const SLIDE_MASTER_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme" Target="../theme/theme1.xml"/>
</Relationships>"#;

const SLIDE_LAYOUT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldLayout xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
<p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld>
</p:sldLayout>"#;

const SLIDE_LAYOUT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="../slideMasters/slideMaster1.xml"/>
</Relationships>"#;

const THEME: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office">
<a:themeElements>
<a:clrScheme name="Office"><a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1><a:dk2><a:srgbClr val="44546A"/></a:dk2><a:lt2><a:srgbClr val="E7E6E6"/></a:lt2><a:accent1><a:srgbClr val="4472C4"/></a:accent1><a:accent2><a:srgbClr val="ED7D31"/></a:accent2><a:accent3><a:srgbClr val="A5A5A5"/></a:accent3><a:accent4><a:srgbClr val="FFC000"/></a:accent4><a:accent5><a:srgbClr val="5B9BD5"/></a:accent5><a:accent6><a:srgbClr val="70AD47"/></a:accent6><a:hlink><a:srgbClr val="0563C1"/></a:hlink><a:folHlink><a:srgbClr val="954F72"/></a:folHlink></a:clrScheme>
<a:fontScheme name="Office"><a:majorFont><a:latin typeface="Calibri Light"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme>
<a:fmtScheme name="Office"><a:fillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:fillStyleLst><a:lnStyleLst><a:ln><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln></a:lnStyleLst><a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst><a:bgFillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:bgFillStyleLst></a:fmtScheme>
</a:themeElements>
</a:theme>"#;

fn write_pptx(path: &Path, inputs: &RenderInputs<'_>) -> Result<()> {
    let mut slides: Vec<(String, String)> = Vec::new();
    slides.push(slide_xml(
        "Executive Summary",
        &[format!("Session ID: {}", inputs.session_id)],
    ));
    slides.push(slide_xml("Hardware Summary", &summary_lines(inputs.hw, "HW Devices")));
    slides.push(slide_xml("Software Summary", &summary_lines(inputs.sw, "SW Packages")));
    for name in inputs.charts.keys() {
        slides.push(slide_xml("Chart", &[name.clone()]));
    }

    let mut entries: Vec<(String, String)> = Vec::new();

    let mut content_types = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/>
<Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"/>
<Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/>
<Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/>
"#,
    );
    for i in 1..=slides.len() {
        content_types.push_str(&format!(
            "<Override PartName=\"/ppt/slides/slide{i}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slide+xml\"/>\n"
        ));
    }
    content_types.push_str("</Types>");

    let mut presentation_rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="slideMasters/slideMaster1.xml"/>
"#,
    );
    let mut slide_id_list = String::new();
    for i in 1..=slides.len() {
        let rid = i + 1;
        presentation_rels.push_str(&format!(
            "<Relationship Id=\"rId{rid}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide\" Target=\"slides/slide{i}.xml\"/>\n"
        ));
        slide_id_list.push_str(&format!("<p:sldId id=\"{}\" r:id=\"rId{rid}\"/>", 255 + i));
    }
    presentation_rels.push_str("</Relationships>");

    let presentation = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
<p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>
<p:sldIdLst>{slide_id_list}</p:sldIdLst>
<p:sldSz cx="12192000" cy="6858000"/>
</p:presentation>"#
    );

    entries.push(("[Content_Types].xml".to_string(), content_types));
    entries.push(("_rels/.rels".to_string(), PPTX_RELS.to_string()));
    entries.push(("ppt/presentation.xml".to_string(), presentation));
    entries.push(("ppt/_rels/presentation.xml.rels".to_string(), presentation_rels));
    entries.push((
        "ppt/slideMasters/slideMaster1.xml".to_string(),
        SLIDE_MASTER.to_string(),
    ));
    entries.push((
        "ppt/slideMasters/_rels/slideMaster1.xml.rels".to_string(),
        SLIDE_MASTER_RELS.to_string(),
    ));
    entries.push((
        "ppt/slideLayouts/slideLayout1.xml".to_string(),
        SLIDE_LAYOUT.to_string(),
    ));
    entries.push((
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels".to_string(),
        SLIDE_LAYOUT_RELS.to_string(),
    ));
    entries.push(("ppt/theme/theme1.xml".to_string(), THEME.to_string()));
    for (i, (slide, rels)) in slides.iter().enumerate() {
        let n = i + 1;
        entries.push((format!("ppt/slides/slide{n}.xml"), slide.clone()));
        entries.push((format!("ppt/slides/_rels/slide{n}.xml.rels"), rels.clone()));
    }

    let borrowed: Vec<(&str, String)> = entries
        .iter()
        .map(|(name, content)| (name.as_str(), content.clone()))
        .collect();
    write_package(path, &borrowed)
}

/// One slide as (slide xml, slide rels xml).
fn slide_xml(title: &str, lines: &[String]) -> (String, String) {
    let mut paragraphs = String::new();
    for line in lines {
        paragraphs.push_str(&format!(
            "<a:p><a:r><a:t>{}</a:t></a:r></a:p>",
            escape(line)
        ));
    }
    let slide = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
<p:cSld><p:spTree>
<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>
<p:sp><p:nvSpPr><p:cNvPr id="2" name="Title"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr>
<p:spPr><a:xfrm><a:off x="685800" y="457200"/><a:ext cx="10820400" cy="914400"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr>
<p:txBody><a:bodyPr/><a:p><a:r><a:rPr lang="en-US" sz="3200" b="1"/><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp>
<p:sp><p:nvSpPr><p:cNvPr id="3" name="Body"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr>
<p:spPr><a:xfrm><a:off x="685800" y="1600200"/><a:ext cx="10820400" cy="4572000"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr>
<p:txBody><a:bodyPr/>{paragraphs}</p:txBody></p:sp>
</p:spTree></p:cSld>
</p:sld>"#,
        escape(title)
    );
    let rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>
</Relationships>"#
        .to_string();
    (slide, rels)
}

fn summary_lines(table: &Table, noun: &str) -> Vec<String> {
    if table.is_empty() {
        return vec![format!("No {noun} data available.")];
    }
    let mut lines = vec![format!("Total {noun}: {}", table.row_count())];
    let tiers = table.value_counts(TIER_COLUMN);
    if tiers.is_empty() {
        lines.push("No tier data.".to_string());
    } else {
        lines.push("Tier Distribution:".to_string());
        for (tier, count) in tiers {
            lines.push(format!("{tier}: {count}"));
        }
    }
    lines
}

// --- Shared ---------------------------------------------------------------

fn write_package(path: &Path, entries: &[(&str, String)]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let mut package = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in entries {
        package
            .start_file(*name, options)
            .map_err(|e| Error::Render(format!("{name}: {e}")))?;
        package.write_all(content.as_bytes())?;
    }
    package
        .finish()
        .map_err(|e| Error::Render(e.to_string()))?;
    Ok(())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrative::NarrativeSection;

    fn inputs<'a>(
        hw: &'a Table,
        sw: &'a Table,
        charts: &'a BTreeMap<String, PathBuf>,
        sections: &'a [NarrativeSection],
    ) -> RenderInputs<'a> {
        RenderInputs {
            session_id: "render-test",
            hw,
            sw,
            charts,
            sections,
        }
    }

    #[test]
    fn renders_both_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let hw = Table::from_csv_reader("Device ID,Tier\nD-1,Excellent\n".as_bytes()).unwrap();
        let sw = Table::new();
        let charts = BTreeMap::new();
        let sections = vec![NarrativeSection {
            index: 1,
            key: "executive_summary",
            title: "Executive Summary",
            content: "All good.".to_string(),
        }];

        let (docx, pptx) =
            render_locally(dir.path(), &inputs(&hw, &sw, &charts, &sections)).unwrap();
        assert!(docx.exists());
        assert!(pptx.exists());
        // Both are zip packages (PK magic).
        for path in [&docx, &pptx] {
            let bytes = std::fs::read(path).unwrap();
            assert_eq!(&bytes[..2], b"PK");
        }
    }

    #[test]
    fn empty_tables_render_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let charts = BTreeMap::new();
        let (docx, _pptx) =
            render_locally(dir.path(), &inputs(&Table::new(), &Table::new(), &charts, &[]))
                .unwrap();
        assert!(docx.exists());
    }

    #[test]
    fn xml_escaping_keeps_documents_well_formed() {
        let dir = tempfile::tempdir().unwrap();
        let hw = Table::from_csv_reader("Device Name\n<script>&co\n".as_bytes()).unwrap();
        let charts = BTreeMap::new();
        let result = render_locally(dir.path(), &inputs(&hw, &Table::new(), &charts, &[]));
        assert!(result.is_ok());
    }
}
