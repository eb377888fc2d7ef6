//! Base image selection by runtime tag.

/// Prefix table, most specific first.
const BASE_IMAGES: &[(&str, &str)] = &[
  ("python3.9", "python:3.9-slim"),
  ("python3.10", "python:3.10-slim"),
  ("python3.11", "python:3.11-slim"),
  ("python3.12", "python:3.12-slim"),
  ("python", "python:3.11-slim"),
  ("node18", "node:18-alpine"),
  ("node20", "node:20-alpine"),
  ("node22", "node:22-alpine"),
  ("node", "node:20-alpine"),
  ("go1.21", "golang:1.21-alpine"),
  ("go1.22", "golang:1.22-alpine"),
  ("go", "golang:1.22-alpine"),
  ("java17", "eclipse-temurin:17-jre"),
  ("java21", "eclipse-temurin:21-jre"),
  ("java", "eclipse-temurin:21-jre"),
  ("ruby3.2", "ruby:3.2-slim"),
  ("ruby3.3", "ruby:3.3-slim"),
  ("ruby", "ruby:3.3-slim"),
];

/// Image used for `custom` and anything the table does not know.
pub const DEFAULT_BASE_IMAGE: &str = "debian:bookworm-slim";

/// Maps a runtime tag to a base image reference. Never fails.
pub fn derived_start_image(runtime: &str) -> &'static str {
  BASE_IMAGES
    .iter()
    .find(|(prefix, _)| runtime.starts_with(prefix))
    .map(|(_, image)| *image)
    .unwrap_or(DEFAULT_BASE_IMAGE)
}
