/// Site and dataset constants for the Vitibrasil source.

// Landing page the dataset options hang off
pub const DEFAULT_BASE_URL: &str = "http://vitibrasil.cnpuv.embrapa.br/index.php";

// `opcao` query values of the landing pages
pub const PRODUCTION_OPTION: &str = "opt_02";
pub const PROCESSING_OPTION: &str = "opt_03";
pub const MARKETING_OPTION: &str = "opt_04";
pub const IMPORTATION_OPTION: &str = "opt_05";
pub const EXPORTATION_OPTION: &str = "opt_06";

// Landing page structure
pub const DOWNLOAD_LINK_SELECTOR: &str = "a.footer_content[href]";
pub const DOWNLOAD_LINK_TOKEN: &str = "DOWNLOAD";

// Year cells carrying no measurement
pub const NOISE_TOKENS: [&str; 2] = ["nd", "*"];

pub const CACHE_FILE_EXTENSION: &str = "csv";

pub const USER_AGENT: &str = "vitibrasil-ingest/0.1";
