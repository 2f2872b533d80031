//! Request bodies for listing and agency writes arrive either as multipart
//! (when images are attached) or as JSON. Both are flattened into string
//! fields plus file parts and read through typed getters.

use std::collections::HashMap;
use std::str::FromStr;

use axum::http::HeaderMap;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub filename: String,
    pub data: Bytes,
}

#[derive(Debug, Default)]
pub struct FormPayload {
    fields: HashMap<String, Vec<String>>,
    files: Vec<FilePart>,
}

impl FormPayload {
    /// Parse a multipart or JSON body depending on the Content-Type header.
    pub async fn from_request(
        headers: &HeaderMap,
        body: Bytes,
        max_file_size: usize,
    ) -> Result<Self, AppError> {
        let content_type = headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json");

        if content_type.contains("multipart/form-data") {
            Self::from_multipart(content_type, body, max_file_size).await
        } else if body.is_empty() {
            Ok(Self::default())
        } else {
            let value: Value = serde_json::from_slice(&body)
                .map_err(|e| AppError::BadRequest(format!("Invalid JSON: {e}")))?;
            Self::from_json(&value)
        }
    }

    async fn from_multipart(
        content_type: &str,
        body: Bytes,
        max_file_size: usize,
    ) -> Result<Self, AppError> {
        let boundary = multer::parse_boundary(content_type)
            .map_err(|_| AppError::BadRequest("Missing multipart boundary".to_string()))?;

        let stream = futures_util::stream::once(async { Ok::<_, std::io::Error>(body) });
        let mut multipart = multer::Multipart::new(stream, boundary);

        let mut payload = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?
        {
            let name = field.name().unwrap_or("unknown").to_string();

            if let Some(filename) = field.file_name().map(str::to_string) {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("File read error: {e}")))?;
                if data.is_empty() {
                    continue;
                }
                if data.len() > max_file_size {
                    return Err(AppError::BadRequest(format!(
                        "File {filename} exceeds the {} byte limit",
                        max_file_size
                    )));
                }
                payload.files.push(FilePart {
                    field: name,
                    filename,
                    data,
                });
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Field read error: {e}")))?;
                payload.push(name, value);
            }
        }

        Ok(payload)
    }

    pub fn from_json(value: &Value) -> Result<Self, AppError> {
        let obj = value
            .as_object()
            .ok_or_else(|| AppError::BadRequest("Expected a JSON object".to_string()))?;

        let mut payload = Self::default();
        for (key, value) in obj {
            match value {
                Value::Null => payload.push(key.clone(), String::new()),
                Value::Array(items) => {
                    // An explicit empty array still marks the field as present.
                    payload.fields.entry(key.clone()).or_default();
                    for item in items {
                        payload.push(key.clone(), scalar_to_string(item));
                    }
                }
                other => payload.push(key.clone(), scalar_to_string(other)),
            }
        }
        Ok(payload)
    }

    fn push(&mut self, name: String, value: String) {
        self.fields.entry(name).or_default().push(value);
    }

    /// `None` when absent, `Some(None)` when sent empty.
    pub fn text(&self, name: &str) -> Option<Option<String>> {
        self.fields.get(name).map(|values| {
            values
                .first()
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
    }

    pub fn required_text(&self, name: &str) -> Result<String, AppError> {
        self.text(name)
            .flatten()
            .ok_or_else(|| AppError::BadRequest(format!("{name} is required")))
    }

    pub fn number<T: FromStr>(&self, name: &str) -> Result<Option<Option<T>>, AppError> {
        match self.text(name) {
            None => Ok(None),
            Some(None) => Ok(Some(None)),
            Some(Some(raw)) => raw
                .parse::<T>()
                .map(|n| Some(Some(n)))
                .map_err(|_| AppError::BadRequest(format!("{name} must be a number"))),
        }
    }

    pub fn required_number<T: FromStr>(&self, name: &str) -> Result<T, AppError> {
        self.number(name)?
            .flatten()
            .ok_or_else(|| AppError::BadRequest(format!("{name} is required")))
    }

    /// Parse one of a fixed set of lowercase values (any serde enum).
    pub fn choice<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, AppError> {
        match self.text(name).flatten() {
            None => Ok(None),
            Some(raw) => serde_json::from_value(Value::String(raw.to_lowercase()))
                .map(Some)
                .map_err(|_| AppError::BadRequest(format!("Invalid value for {name}: {raw}"))),
        }
    }

    pub fn required_choice<T: DeserializeOwned>(&self, name: &str) -> Result<T, AppError> {
        self.choice(name)?
            .ok_or_else(|| AppError::BadRequest(format!("{name} is required")))
    }

    /// A list field: repeated parts, a JSON array string, or a comma list.
    pub fn list(&self, name: &str) -> Option<Vec<String>> {
        let values = self.fields.get(name)?;
        let items: Vec<String> = if let [single] = values.as_slice() {
            let trimmed = single.trim();
            if trimmed.starts_with('[') {
                serde_json::from_str::<Vec<Value>>(trimmed)
                    .map(|items| items.iter().map(scalar_to_string).collect())
                    .unwrap_or_else(|_| split_commas(trimmed))
            } else {
                split_commas(trimmed)
            }
        } else {
            values.clone()
        };
        Some(
            items
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    /// Every value of a list field parsed as a choice, duplicates dropped.
    pub fn choices<T: DeserializeOwned + PartialEq>(
        &self,
        name: &str,
    ) -> Result<Option<Vec<T>>, AppError> {
        let Some(raw) = self.list(name) else {
            return Ok(None);
        };
        let mut parsed: Vec<T> = Vec::with_capacity(raw.len());
        for item in raw {
            let value = serde_json::from_value(Value::String(item.to_lowercase()))
                .map_err(|_| AppError::BadRequest(format!("Invalid value for {name}: {item}")))?;
            if !parsed.contains(&value) {
                parsed.push(value);
            }
        }
        Ok(Some(parsed))
    }

    // Partial updates: each `update_*` overwrites `target` only when the field
    // was sent. Sending an empty value clears optional fields and is rejected
    // for required ones.

    pub fn update_text(&self, target: &mut String, name: &str) -> Result<(), AppError> {
        if let Some(value) = self.text(name) {
            *target = value.ok_or_else(|| AppError::BadRequest(format!("{name} cannot be empty")))?;
        }
        Ok(())
    }

    pub fn update_opt_text(&self, target: &mut Option<String>, name: &str) {
        if let Some(value) = self.text(name) {
            *target = value;
        }
    }

    pub fn update_number<T: FromStr>(&self, target: &mut T, name: &str) -> Result<(), AppError> {
        if let Some(value) = self.number(name)? {
            *target = value.ok_or_else(|| AppError::BadRequest(format!("{name} cannot be empty")))?;
        }
        Ok(())
    }

    pub fn update_opt_number<T: FromStr>(
        &self,
        target: &mut Option<T>,
        name: &str,
    ) -> Result<(), AppError> {
        if let Some(value) = self.number(name)? {
            *target = value;
        }
        Ok(())
    }

    pub fn update_choice<T: DeserializeOwned>(&self, target: &mut T, name: &str) -> Result<(), AppError> {
        if let Some(value) = self.choice(name)? {
            *target = value;
        }
        Ok(())
    }

    pub fn update_list(&self, target: &mut Vec<String>, name: &str) {
        if let Some(values) = self.list(name) {
            *target = values;
        }
    }

    pub fn files(&self, field: &str) -> Vec<&FilePart> {
        self.files.iter().filter(|f| f.field == field).collect()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn split_commas(raw: &str) -> Vec<String> {
    raw.split(',').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::ListingCondition;

    #[test]
    fn json_fields_are_flattened() {
        let form = FormPayload::from_json(&json!({
            "brand": " Peugeot ",
            "year": 2019,
            "price": 15500.5,
            "color": null,
            "features": ["GPS", "ABS"],
        }))
        .unwrap();

        assert_eq!(form.required_text("brand").unwrap(), "Peugeot");
        assert_eq!(form.required_number::<i32>("year").unwrap(), 2019);
        assert_eq!(form.required_number::<f64>("price").unwrap(), 15500.5);
        assert_eq!(form.text("color"), Some(None));
        assert_eq!(form.text("model"), None);
        assert_eq!(form.list("features").unwrap(), vec!["GPS", "ABS"]);
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let form = FormPayload::from_json(&json!({ "year": "twenty" })).unwrap();
        assert!(matches!(
            form.number::<i32>("year"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn choices_are_case_insensitive() {
        let form = FormPayload::from_json(&json!({ "condition": "Used", "other": "bogus" })).unwrap();
        assert_eq!(
            form.choice::<ListingCondition>("condition").unwrap(),
            Some(ListingCondition::Used)
        );
        assert!(form.choice::<ListingCondition>("other").is_err());
        assert!(form.required_choice::<ListingCondition>("missing").is_err());
    }

    #[test]
    fn list_accepts_json_string_and_commas() {
        let form = FormPayload::from_json(&json!({
            "a": "[\"x\", \"y\"]",
            "b": "x, y ,,z",
            "c": [],
        }))
        .unwrap();
        assert_eq!(form.list("a").unwrap(), vec!["x", "y"]);
        assert_eq!(form.list("b").unwrap(), vec!["x", "y", "z"]);
        assert_eq!(form.list("c").unwrap(), Vec::<String>::new());
        assert!(form.list("d").is_none());
    }

    #[test]
    fn updates_touch_only_sent_fields() {
        let form = FormPayload::from_json(&json!({
            "brand": "Renault",
            "color": "",
            "mileage": "1200",
            "model": "",
        }))
        .unwrap();

        let mut brand = "Fiat".to_string();
        let mut color = Some("red".to_string());
        let mut category = Some("hatchback".to_string());
        let mut mileage: Option<i32> = None;
        let mut model = "Panda".to_string();

        form.update_text(&mut brand, "brand").unwrap();
        form.update_opt_text(&mut color, "color");
        form.update_opt_text(&mut category, "category");
        form.update_opt_number(&mut mileage, "mileage").unwrap();

        assert_eq!(brand, "Renault");
        assert_eq!(color, None);
        assert_eq!(category.as_deref(), Some("hatchback"));
        assert_eq!(mileage, Some(1200));
        assert!(form.update_text(&mut model, "model").is_err());
    }

    #[test]
    fn choices_dedupe_and_validate() {
        use crate::models::VehicleType;

        let form = FormPayload::from_json(&json!({
            "vehicle_types": "car, Motorcycle, car",
            "bad": ["car", "boat"],
        }))
        .unwrap();
        assert_eq!(
            form.choices::<VehicleType>("vehicle_types").unwrap().unwrap(),
            vec![VehicleType::Car, VehicleType::Motorcycle]
        );
        assert!(form.choices::<VehicleType>("bad").is_err());
        assert!(form.choices::<VehicleType>("missing").unwrap().is_none());
    }

    #[tokio::test]
    async fn multipart_collects_fields_and_files() {
        let boundary = "XBOUNDARY";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"brand\"\r\n\r\nYamaha\r\n\
             --{boundary}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"a.png\"\r\n\
             Content-Type: image/png\r\n\r\nPNGDATA\r\n--{boundary}--\r\n"
        );
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            format!("multipart/form-data; boundary={boundary}").parse().unwrap(),
        );

        let form = FormPayload::from_request(&headers, Bytes::from(body), 1024)
            .await
            .unwrap();
        assert_eq!(form.required_text("brand").unwrap(), "Yamaha");
        let files = form.files("images");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "a.png");
        assert_eq!(&files[0].data[..], b"PNGDATA");
    }

    #[tokio::test]
    async fn oversized_file_is_rejected() {
        let boundary = "XBOUNDARY";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"a.jpg\"\r\n\r\n0123456789\r\n--{boundary}--\r\n"
        );
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            format!("multipart/form-data; boundary={boundary}").parse().unwrap(),
        );
        let result = FormPayload::from_request(&headers, Bytes::from(body), 4).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
