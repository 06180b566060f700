use anyhow::Result;
use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::extractor::PageRangeExtractor;
use crate::license::License;
use crate::page_range::PageRange;
use crate::pdf::PdfDocument;

// Request structs for tools

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PathRequest {
    #[schemars(description = "Path to the PDF file")]
    pub path: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PdfSectionRequest {
    #[schemars(description = "Path to the source PDF file")]
    pub path: String,
    #[schemars(description = "First page number (1-based, inclusive)")]
    pub from: i64,
    #[schemars(description = "Last page number (1-based, inclusive)")]
    pub till: i64,
    #[schemars(
        description = "Output file path (default: source path with '.pdf' replaced by '_output.pdf')"
    )]
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PdfServer {
    license: License,
    tool_router: ToolRouter<Self>,
}

impl PdfServer {
    pub fn new(license: License) -> Self {
        Self {
            license,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl PdfServer {
    #[tool(description = "Get PDF metadata including title, author, creator, producer, creation date, and page count")]
    fn pdf_info(&self, Parameters(PathRequest { path }): Parameters<PathRequest>) -> String {
        match PdfDocument::open(&path) {
            Ok(doc) => {
                let info = doc.get_info();
                let result = PdfInfoResult {
                    path,
                    version: info.version,
                    page_count: info.page_count,
                    title: info.title,
                    author: info.author,
                    creator: info.creator,
                    producer: info.producer,
                    creation_date: info.creation_date,
                    mod_date: info.mod_date,
                    subject: info.subject,
                    keywords: info.keywords,
                };
                serde_json::to_string_pretty(&result).unwrap_or_else(|e| format!("Error: {}", e))
            }
            Err(e) => format!("Error: {}", e),
        }
    }

    #[tool(description = "Copy the pages from..till (1-based, inclusive) of a PDF into a new PDF file")]
    fn pdf_section(&self, Parameters(req): Parameters<PdfSectionRequest>) -> String {
        let extractor = PageRangeExtractor::new(&self.license);
        let source = Path::new(&req.path);
        let range = PageRange::new(req.from, req.till);

        let extraction = match &req.output {
            Some(output) => extractor.extract_to(source, range, Path::new(output)),
            None => extractor.extract(source, range),
        };

        match extraction {
            Ok(extraction) => {
                let result = SectionResult {
                    output_path: extraction.output_path.display().to_string(),
                    page_count: extraction.page_count,
                };
                serde_json::to_string_pretty(&result).unwrap_or_else(|e| format!("Error: {}", e))
            }
            Err(e) => format!("Error: {}", e),
        }
    }
}

// Result types for MCP tools

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PdfInfoResult {
    pub path: String,
    pub version: String,
    pub page_count: u32,
    pub title: Option<String>,
    pub author: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub mod_date: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SectionResult {
    pub output_path: String,
    pub page_count: u32,
}

#[tool_handler]
impl ServerHandler for PdfServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "PDF page range tools. Use pdf_info to get document metadata and the page count, \
                 and pdf_section to copy a contiguous page range into a new PDF."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

pub async fn run_server(license: License) -> Result<()> {
    let server = PdfServer::new(license);

    // Serve using stdin/stdout as a tuple
    let service = server.serve((tokio::io::stdin(), tokio::io::stdout())).await?;

    service.waiting().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license::LicenseKey;
    use crate::pdf::testing::{sample_pdf, write_pdf};
    use lopdf::{dictionary, Object};

    fn server() -> PdfServer {
        PdfServer::new(License::register(LicenseKey::new("MCP-KEY").unwrap()).unwrap())
    }

    #[test]
    fn test_pdf_section_tool() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_pdf(dir.path(), "talk.pdf", &mut sample_pdf(8));

        let reply = server().pdf_section(Parameters(PdfSectionRequest {
            path: source.display().to_string(),
            from: 2,
            till: 4,
            output: None,
        }));
        let result: SectionResult = serde_json::from_str(&reply).unwrap();
        assert_eq!(result.page_count, 3);
        assert!(result.output_path.ends_with("talk_output.pdf"));
    }

    #[test]
    fn test_pdf_info_tool_reports_dates() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = sample_pdf(3);
        let info_id = doc.add_object(dictionary! {
            "CreationDate" => Object::string_literal("D:20240101120000Z"),
            "ModDate" => Object::string_literal("D:20240315080000Z"),
        });
        doc.trailer.set("Info", Object::Reference(info_id));
        let source = write_pdf(dir.path(), "dated.pdf", &mut doc);

        let reply = server().pdf_info(Parameters(PathRequest {
            path: source.display().to_string(),
        }));
        let result: PdfInfoResult = serde_json::from_str(&reply).unwrap();
        assert_eq!(result.page_count, 3);
        assert_eq!(result.creation_date.as_deref(), Some("D:20240101120000Z"));
        assert_eq!(result.mod_date.as_deref(), Some("D:20240315080000Z"));
    }

    #[test]
    fn test_pdf_info_tool_reports_errors_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let reply = server().pdf_info(Parameters(PathRequest {
            path: dir.path().join("missing.pdf").display().to_string(),
        }));
        assert!(reply.starts_with("Error: cannot read source PDF"));
    }
}
