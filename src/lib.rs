#![doc = r#"
xnatdl: download XNAT imaging data and reorganize it into BIDS.

This crate provides a typed API for querying an XNAT server, downloading scan and
assessor resources to local disk while keeping a CSV download report, and
converting the downloaded NIfTI data of a project into the BIDS layout. It powers
the `xnatdownload` and `xnat2bids` binaries and can be embedded in your own Rust
applications.

Stability
---------
The public library API is experimental in initial releases and may evolve.
Breaking changes can occur.

Quick start: download scans of a project
----------------------------------------
```rust,no_run
use std::path::PathBuf;
use xnatdl::{run_download, DownloadParams, Selection, XnatClient, XnatCredentials};

fn main() -> xnatdl::Result<()> {
    let credentials = XnatCredentials::resolve(Some("https://xnat.example.org"), Some("alice"))?;
    let client = XnatClient::connect(&credentials)?;

    let params = DownloadParams {
        directory: PathBuf::from("/data/xnat"),
        projects: vec!["PID".to_string()],
        scan_types: Some(Selection::Only(vec!["T1*".into(), "fMRI*".into()])),
        scan_resources: Some(Selection::Only(vec!["NIFTI".into()])),
        qualities: Some(Selection::Only(vec!["usable".into()])),
        ..Default::default()
    };

    let summary = run_download(&client, &params, &chrono::Local::now())?;
    println!("downloaded={} up_to_date={}", summary.downloaded, summary.up_to_date);
    Ok(())
}
```

Convert a downloaded project to BIDS
------------------------------------
```rust,no_run
use std::path::Path;
use xnatdl::{convert_to_bids, XnatClient, XnatCredentials};

fn main() -> xnatdl::Result<()> {
    let client = XnatClient::connect(&XnatCredentials::resolve(None, None)?)?;
    let report = convert_to_bids(&client, Path::new("/data/xnat"), Path::new("/data/bids"), "PID")?;
    println!("converted={} skipped={}", report.converted, report.skipped);
    Ok(())
}
```

The conversion reads three optional project resources on XNAT:
`BIDS_datatype/datatype_mapping.json` (scan type to `anat`/`func`/`dwi`/`fmap`),
`BIDS_task/task_mapping.json` (scan type to task name) and
`BIDS_repetition_time_sec/repetition_time_sec.json` (scan type to TR in seconds,
required for functional scans).

Testing against your own backend
--------------------------------
Everything that talks to XNAT goes through the [`XnatApi`] trait; implement it
to run the download and BIDS code against fixtures.

Error handling
--------------
All public functions return `xnatdl::Result<T>`; match on `xnatdl::Error` to handle
specific cases.

```rust,no_run
use std::path::Path;
use xnatdl::{convert_to_bids, Error, XnatClient, XnatCredentials};

fn main() {
    let Ok(credentials) = XnatCredentials::resolve(Some("https://xnat.example.org"), None) else {
        return;
    };
    let Ok(client) = XnatClient::connect(&credentials) else {
        return;
    };
    match convert_to_bids(&client, Path::new("/data/xnat"), Path::new("/data/bids"), "PID") {
        Ok(_) => {}
        Err(Error::Xnat { uri, status }) => eprintln!("XNAT answered {status} for {uri}"),
        Err(Error::Nifti { path, reason }) => eprintln!("bad NIfTI {path}: {reason}"),
        Err(other) => eprintln!("Other error: {other}"),
    }
}
```

Useful modules
--------------
- [`api`]: high-level entry points.
- [`core`]: filters, paths, download report, downloader and BIDS conversion.
- [`io`]: XNAT client, catalog XML, NIfTI headers, archives and credentials.
- [`types`]: shared records and enums.
- [`error`]: crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod logging;
pub mod types;

// Curated public API surface
// Types
pub use crate::core::params::DownloadParams;
pub use error::{Error, Result};
pub use types::{AssessorRecord, BidsDataType, ObjectType, ScanRecord, Selection};

// XNAT access
pub use io::{Investigator, XnatApi, XnatClient, XnatCredentials};

// High-level API re-exports
pub use api::{
    DownloadSummary, Listing, bids_projects, check_projects, convert_downloaded, convert_to_bids,
    list_objects, run_download,
};
pub use crate::core::bids::{BidsReport, transform_to_bids};
