// Request builders for each generation call

use bytes::Bytes;
use serde_json::{Value, json};

use crate::client::{ContentRequest, GenerationConfig, InlineData, Part, VideoRequest};
use crate::models::{BatchImage, ImageSize, ProjectInputs, Quote};

const ESTIMATOR_INSTRUCTION: &str = "You are an expert construction estimator and interior designer. \
Analyze project images/videos and provide accurate cost estimates based on current US market rates. \
Be concise and precise.";

const JSON_MIME: &str = "application/json";

// Output schema the analysis model must follow
pub fn quote_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "projectName": { "type": "STRING", "description": "Project name (max 50 chars)" },
            "summary": { "type": "STRING", "description": "Executive summary (max 200 chars)" },
            "totalEstimatedCostMin": { "type": "NUMBER" },
            "totalEstimatedCostMax": { "type": "NUMBER" },
            "currency": { "type": "STRING", "description": "USD" },
            "breakdown": {
                "type": "ARRAY",
                "description": "5-8 cost breakdown items (Materials, Labor, Permits, Other)",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "description": { "type": "STRING" },
                        "estimatedCost": { "type": "NUMBER" },
                        "category": { "type": "STRING" }
                    }
                }
            },
            "timeline": {
                "type": "ARRAY",
                "description": "3-4 project phases",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "phaseName": { "type": "STRING" },
                        "duration": { "type": "STRING", "description": "e.g. '2-3 weeks'" },
                        "estimatedCost": { "type": "NUMBER" },
                        "description": { "type": "STRING" },
                        "tasks": { "type": "ARRAY", "items": { "type": "STRING" } }
                    }
                }
            },
            "materials": { "type": "ARRAY", "items": { "type": "STRING" } },
            "designStyleSuggestions": { "type": "ARRAY", "items": { "type": "STRING" } }
        },
        "required": [
            "projectName",
            "totalEstimatedCostMin",
            "totalEstimatedCostMax",
            "breakdown",
            "timeline"
        ]
    })
}

fn manual_inputs_text(inputs: &ProjectInputs) -> String {
    let mut text = String::new();
    if !inputs.manual_materials.is_empty() {
        let materials: Vec<String> = inputs
            .manual_materials
            .iter()
            .map(|m| format!("{} ({})", m.name, m.quantity))
            .collect();
        text.push_str(&format!("\nUser Materials: {}\n", materials.join(", ")));
    }
    if let Some(hours) = inputs.labor_hours.as_deref().filter(|h| !h.trim().is_empty()) {
        text.push_str(&format!("Labor Hours: ~{} hrs\n", hours));
    }
    text
}

fn analysis_config() -> GenerationConfig {
    GenerationConfig {
        temperature: Some(0.3),
        top_k: Some(30),
        top_p: Some(0.8),
        response_mime_type: Some(JSON_MIME.to_string()),
        response_schema: Some(quote_schema()),
    }
}

pub fn analysis_request(media: Bytes, mime_type: &str, inputs: &ProjectInputs) -> ContentRequest {
    let prompt = format!(
        "Analyze this project site image/video:\nVision: \"{}\"\nStyle: \"{}\"\n{}\n\
         Provide: realistic cost range, detailed breakdown (5-8 items), 3-4 phase timeline with tasks, \
         material list, style suggestions.",
        inputs.prompt,
        inputs.style,
        manual_inputs_text(inputs)
    );
    ContentRequest {
        parts: vec![
            Part::Inline(InlineData::new(mime_type, media)),
            Part::Text(prompt),
        ],
        system_instruction: Some(ESTIMATOR_INSTRUCTION.to_string()),
        config: analysis_config(),
    }
}

pub fn batch_request(images: &[BatchImage], inputs: &ProjectInputs) -> ContentRequest {
    let mut parts = Vec::with_capacity(images.len() * 2 + 1);
    for (index, image) in images.iter().enumerate() {
        parts.push(Part::Inline(InlineData::new(
            image.mime_type.clone(),
            image.data.clone(),
        )));
        if let Some(label) = &image.label {
            parts.push(Part::Text(format!("Image {}: {}", index + 1, label)));
        }
    }
    parts.push(Part::Text(format!(
        "Analyze these {} project site images collectively for a comprehensive estimate.\n\
         Vision: \"{}\"\nStyle: \"{}\"\n{}\n\
         Provide a unified cost estimate considering all angles of the project. \
         Be realistic with US market rates.",
        images.len(),
        inputs.prompt,
        inputs.style,
        manual_inputs_text(inputs)
    )));
    ContentRequest {
        parts,
        system_instruction: Some(ESTIMATOR_INSTRUCTION.to_string()),
        config: analysis_config(),
    }
}

pub fn narration_request(audio: Bytes, mime_type: &str) -> ContentRequest {
    let prompt = "You are an expert construction consultant. Listen to this project walkthrough \
narration and extract:\n1. Full transcription\n2. Key project points (5-7 bullet points)\n\
3. Materials mentioned or implied\n4. Project complexity assessment\n\n\
Respond in JSON format: {\"transcription\": \"...\", \"keyPoints\": [], \
\"suggestedMaterials\": [], \"estimatedComplexity\": \"simple|moderate|complex\"}";
    ContentRequest {
        parts: vec![
            Part::Inline(InlineData::new(mime_type, audio)),
            Part::Text(prompt.to_string()),
        ],
        system_instruction: None,
        config: GenerationConfig {
            response_mime_type: Some(JSON_MIME.to_string()),
            ..Default::default()
        },
    }
}

pub fn description_request(quote: &Quote, prompt: &str, style: &str) -> ContentRequest {
    let phases: Vec<&str> = quote
        .timeline
        .iter()
        .map(|phase| phase.phase_name.as_str())
        .collect();
    let materials: Vec<&str> = quote.materials.iter().take(5).map(String::as_str).collect();
    let text = format!(
        "You are a professional copywriter specializing in construction and interior design quotes.\n\n\
         Create an engaging, professional 2-3 paragraph description for this project estimate that \
         uses the user's vision and style, highlights key value, and mentions specific materials \
         and timeline benefits. It must be suitable for email or presentation.\n\n\
         User Vision: \"{}\"\nUser Style Preference: \"{}\"\n\n\
         Project Details:\n- Name: {}\n- Cost Range: ${:.0} - ${:.0}\n- Timeline: {}\n- Key Materials: {}",
        prompt,
        style,
        quote.project_name,
        quote.total_estimated_cost_min,
        quote.total_estimated_cost_max,
        phases.join(" -> "),
        materials.join(", ")
    );
    ContentRequest {
        parts: vec![Part::Text(text)],
        system_instruction: None,
        config: GenerationConfig {
            temperature: Some(0.7),
            top_p: Some(0.9),
            ..Default::default()
        },
    }
}

pub fn visualization_request(prompt: &str, style: &str, size: ImageSize) -> ContentRequest {
    let text = format!(
        "Photorealistic architectural rendering: {}. Style: {}. Output resolution: {}. \
         High detail, cinematic lighting, professional quality.",
        prompt,
        style,
        size.as_str()
    );
    ContentRequest {
        parts: vec![Part::Text(text)],
        system_instruction: None,
        config: GenerationConfig {
            temperature: Some(0.6),
            top_p: Some(0.85),
            ..Default::default()
        },
    }
}

pub fn edit_request(image: Bytes, edit_prompt: &str) -> ContentRequest {
    ContentRequest {
        parts: vec![
            Part::Inline(InlineData::new("image/png", image)),
            Part::Text(format!("Edit this image based on: {}", edit_prompt)),
        ],
        system_instruction: None,
        config: GenerationConfig {
            temperature: Some(0.4),
            ..Default::default()
        },
    }
}

pub fn video_request(prompt: &str, style: &str, seed_image: Option<Bytes>) -> VideoRequest {
    VideoRequest {
        prompt: format!(
            "Cinematic project walkthrough video: {}. Style: {}. Smooth camera movement, professional quality.",
            prompt, style
        ),
        seed_image: seed_image.map(|data| InlineData::new("image/png", data)),
        resolution: "720p".to_string(),
        aspect_ratio: "16:9".to_string(),
        count: 1,
    }
}
