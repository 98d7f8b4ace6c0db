/*!
# Chemical Equipment Dataset Service

A web service for uploading chemical-equipment CSV datasets, browsing
per-column statistics, and downloading PDF reports.

## Overview

Users upload CSV files describing equipment measurements. The service parses
each file, classifies columns as numeric or textual, computes descriptive
statistics (count, mean, median, standard deviation, min, max) for the
numeric columns, and caches the result alongside the upload record. Cached
summaries back both the JSON summary endpoint and the PDF report endpoint.
Each user keeps only their most recent uploads; older datasets and their
files are evicted automatically.

## Architecture

The service follows a straightforward layered design:

### HTTP Layer
- **Technologies**: axum, tokio
- **Key Components**:
  - Router and handlers (`app`) - upload, summary, history, report endpoints
  - Authentication middleware (`auth`) - token header or session cookie

### Core Layer
- **Components**:
  - Summary engine (`summary`) - CSV parsing, numeric inference, statistics
  - Chart renderer (`chart`) - histogram and boxplot PNGs via plotters
  - Report generator (`report`) - HTML-to-PDF primary strategy with a
    pure-Rust fallback writer
  - Retention (`retention`) - per-user history pruning

### Persistence Layer
- JSON-file stores for users and dataset records (`auth`, `store`)
- Uploaded files kept on disk under a per-user directory

## Modules

- **app**: Routing, application state and HTTP handlers
- **auth**: User accounts, sessions and the authentication middleware
- **chart**: PNG chart rendering for numeric columns
- **config**: Runtime configuration from the environment
- **error**: Error types shared across the crate
- **report**: PDF report generation (dual rendering strategies)
- **retention**: Per-user dataset retention enforcement
- **store**: Dataset records and uploaded-file storage
- **summary**: CSV summary computation

## REST API Endpoints

- `POST /api/auth/register` - Create an account
- `POST /api/auth/login` - Obtain a session token
- `POST /api/auth/logout` - Revoke the current session
- `POST /api/datasets/upload` - Upload a CSV dataset
- `GET /api/datasets/history` - List the caller's recent datasets
- `GET /api/datasets/{id}/summary` - Retrieve the computed summary as JSON
- `GET /api/datasets/{id}/report` - Download the PDF report
*/

pub mod app;
pub mod auth;
pub mod chart;
pub mod config;
pub mod error;
pub mod report;
pub mod retention;
pub mod store;
pub mod summary;
