use serde_json::{Value, json};

pub fn openapi_spec() -> Value {
    json!({
        "openapi": "3.1.0",
        "info": {
            "title": "Communication Module Admin API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "System and per-component initialization control plane for the communication-module event core.",
        },
        "paths": {
            "/healthz": {
                "get": {
                    "summary": "Health check",
                    "responses": {
                        "200": {
                            "description": "Service health",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "required": ["status", "service"],
                                        "properties": {
                                            "status": { "type": "string" },
                                            "service": { "type": "string" },
                                        },
                                    },
                                },
                            },
                        },
                    },
                },
            },
            "/openapi.json": {
                "get": {
                    "summary": "This document",
                    "responses": {
                        "200": { "description": "OpenAPI 3.1 specification" },
                    },
                },
            },
            "/docs": {
                "get": {
                    "summary": "Interactive API reference",
                    "responses": {
                        "200": { "description": "HTML documentation" },
                    },
                },
            },
            "/admin/system/initialize": {
                "post": {
                    "summary": "Initialize the system",
                    "description": "Runs every component initializer in dependency order. Idempotent when the system is already fully initialized.",
                    "responses": {
                        "200": {
                            "description": "All components initialized",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/ActionResponse" },
                                },
                            },
                        },
                        "500": {
                            "description": "One or more component initializers failed",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/ErrorResponse" },
                                },
                            },
                        },
                    },
                },
            },
            "/admin/system/reinitialize": {
                "post": {
                    "summary": "Force full system reinitialization",
                    "description": "Re-runs every initializer regardless of current state, replacing existing subscriptions.",
                    "responses": {
                        "200": {
                            "description": "All components reinitialized",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/ActionResponse" },
                                },
                            },
                        },
                        "500": {
                            "description": "One or more component initializers failed",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/ErrorResponse" },
                                },
                            },
                        },
                    },
                },
            },
            "/admin/system/reinitialize/{component}": {
                "post": {
                    "summary": "Reinitialize one named component",
                    "parameters": [
                        {
                            "name": "component",
                            "in": "path",
                            "required": true,
                            "schema": {
                                "type": "string",
                                "enum": [
                                    "events",
                                    "metrics",
                                    "channel_metrics",
                                    "middleware",
                                    "channels",
                                    "monitoring",
                                ],
                            },
                        },
                    ],
                    "responses": {
                        "200": {
                            "description": "Component reinitialized",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/ComponentResponse" },
                                },
                            },
                        },
                        "400": {
                            "description": "Unknown component name",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/ErrorResponse" },
                                },
                            },
                        },
                        "500": {
                            "description": "The component's initializer failed",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/ErrorResponse" },
                                },
                            },
                        },
                    },
                },
            },
            "/admin/system/status": {
                "get": {
                    "summary": "Read initialization status",
                    "description": "Pure read of orchestrator state plus aggregate event counters; safe to poll.",
                    "responses": {
                        "200": {
                            "description": "Status snapshot",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/StatusSnapshot" },
                                },
                            },
                        },
                    },
                },
            },
        },
        "components": {
            "schemas": {
                "ActionResponse": {
                    "type": "object",
                    "required": ["success", "message"],
                    "properties": {
                        "success": { "type": "boolean" },
                        "message": { "type": "string" },
                    },
                },
                "ComponentResponse": {
                    "type": "object",
                    "required": ["success", "component"],
                    "properties": {
                        "success": { "type": "boolean" },
                        "component": { "type": "string" },
                    },
                },
                "ErrorResponse": {
                    "type": "object",
                    "required": ["success", "message"],
                    "properties": {
                        "success": { "type": "boolean", "const": false },
                        "message": { "type": "string" },
                    },
                },
                "StatusSnapshot": {
                    "type": "object",
                    "required": [
                        "initialized",
                        "state",
                        "components",
                        "event_counts",
                        "total_events",
                        "subscription_count",
                    ],
                    "properties": {
                        "initialized": { "type": "boolean" },
                        "state": {
                            "type": "string",
                            "enum": [
                                "not_initialized",
                                "initializing",
                                "initialized",
                                "partially_initialized",
                            ],
                        },
                        "components": {
                            "type": "object",
                            "additionalProperties": { "type": "boolean" },
                        },
                        "event_counts": {
                            "type": "object",
                            "additionalProperties": { "type": "integer" },
                        },
                        "total_events": { "type": "integer" },
                        "subscription_count": { "type": "integer" },
                    },
                },
            },
        },
    })
}

pub fn scalar_docs_html(spec_url: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Communication Module Admin API Docs</title>
    <style>
      html, body, #app {{
        margin: 0;
        padding: 0;
        height: 100%;
        width: 100%;
      }}
    </style>
  </head>
  <body>
    <div id="app"></div>
    <script src="https://cdn.jsdelivr.net/npm/@scalar/api-reference"></script>
    <script>
      Scalar.createApiReference('#app', {{
        url: '{spec_url}',
      }});
    </script>
  </body>
</html>
"#
    )
}
