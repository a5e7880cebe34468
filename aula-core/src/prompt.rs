//! Prompt assembly for the Chef Marianito assistant.
//!
//! Rendering is pure: the same persona block, history, context and query
//! always produce the same prompt string. The disclosure staging (when the
//! assistant may reveal prices and schedules) lives inside the persona
//! instructions and is re-derived by the model each turn from the rendered
//! conversation, so there is no staging state kept in code.

use crate::models::{ChatMessage, ChatRole, CourseMatch};

/// Context block used when similarity search returns no rows.
pub const NO_CONTEXT_SENTINEL: &str =
    "No se encontró información específica sobre esta consulta en el catálogo actual.";

/// User-facing reply for any turn that fails hard. Raw provider errors never
/// reach the end user.
pub const FALLBACK_REPLY: &str =
    "Lo siento, tuve un problema al procesar tu consulta. Por favor, intenta de nuevo más tarde.";

/// Persona and disclosure policy. The numbered rules gate what the assistant
/// may reveal based on what the visitor has already shared in the visible
/// conversation; they are product behavior, so edit with care and keep the
/// scenario tests below in sync.
pub const SYSTEM_PERSONA: &str = "\
Eres el Chef Marianito, Coordinador Académico del ISMM (Instituto Superior Mariano Moreno). \
Tu misión es asesorar con calidez y profesionalismo a futuros estudiantes de gastronomía y acompañarlos hasta la inscripción.

Reglas de conversación. Antes de responder, revisá toda la conversación previa y la consulta actual para determinar qué datos ya compartió el usuario, y aplicá la regla que corresponda:
1. Si el usuario todavía no dijo su nombre ni el área que le interesa: presentate brevemente, preguntale su nombre y qué área de la gastronomía le interesa. En esta etapa no menciones precios ni horarios.
2. Si el usuario ya dio su nombre y un área de interés pero todavía no dejó un correo electrónico: describí esa área en una sola frase inspiradora y pedile un correo electrónico para enviarle más información. Todavía no menciones precios.
3. Si en la conversación ya aparecen su nombre, un área de interés y un correo electrónico: podés compartir horarios, duración y precio del programa correspondiente, usando únicamente la información del contexto del catálogo, y cerrá siempre con una pregunta que lo invite a dar el siguiente paso de inscripción.
4. Si el usuario pide un dato que no figura en el contexto del catálogo: decilo abiertamente, no inventes cursos, precios ni fechas, y ofrecé tomar sus datos de contacto para que un asesor le responda.

Respondé siempre en español, en tono cálido, cercano y profesional.";

/// Render retrieved course matches into the prompt's context block.
///
/// Items keep the order retrieval returned them in (highest similarity
/// first). An empty slice renders as [`NO_CONTEXT_SENTINEL`].
pub fn format_context(matches: &[CourseMatch]) -> String {
    if matches.is_empty() {
        return NO_CONTEXT_SENTINEL.to_string();
    }

    matches
        .iter()
        .map(|m| format!("Curso: {}\nContenido: {}", m.title, m.content))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// Render conversation history with role labels, oldest first.
pub fn render_history(history: &[ChatMessage]) -> String {
    if history.is_empty() {
        return "(sin mensajes previos)".to_string();
    }

    history
        .iter()
        .map(|msg| {
            let label = match msg.role {
                ChatRole::User => "Usuario",
                ChatRole::Assistant => "Asistente",
            };
            format!("{}: {}", label, msg.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compose the full prompt: persona, prior conversation, catalog context,
/// current query. Deterministic given its inputs.
pub fn render_prompt(history: &[ChatMessage], context: &str, query: &str) -> String {
    format!(
        "{persona}\n\n\
         === CONVERSACIÓN PREVIA ===\n{history}\n\n\
         === CONTEXTO DEL CATÁLOGO ===\n{context}\n\n\
         === CONSULTA ACTUAL ===\n\
         Usuario: {query}\n\
         Asistente:",
        persona = SYSTEM_PERSONA,
        history = render_history(history),
        context = context,
        query = query,
    )
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatMessage;

    fn course(title: &str, content: &str, similarity: f64) -> CourseMatch {
        CourseMatch {
            title: title.to_string(),
            content: content.to_string(),
            similarity,
        }
    }

    #[test]
    fn test_format_context_single_match() {
        let matches = vec![course(
            "Panadería",
            "Curso intensivo de panadería profesional, 6 meses.",
            0.8,
        )];

        let context = format_context(&matches);

        assert_eq!(
            context,
            "Curso: Panadería\nContenido: Curso intensivo de panadería profesional, 6 meses."
        );
    }

    #[test]
    fn test_format_context_joins_matches_with_separator_in_order() {
        let matches = vec![
            course("Panadería", "Contenido A", 0.9),
            course("Pastelería", "Contenido B", 0.7),
        ];

        let context = format_context(&matches);

        assert_eq!(
            context,
            "Curso: Panadería\nContenido: Contenido A\n\n---\n\nCurso: Pastelería\nContenido: Contenido B"
        );
        let pan = context.find("Panadería").unwrap();
        let pas = context.find("Pastelería").unwrap();
        assert!(pan < pas, "Higher-similarity match must render first");
    }

    #[test]
    fn test_format_context_empty_returns_sentinel() {
        let context = format_context(&[]);
        assert_eq!(context, NO_CONTEXT_SENTINEL);
    }

    #[test]
    fn test_render_history_labels_roles_oldest_first() {
        let history = vec![
            ChatMessage::user("Hola"),
            ChatMessage::assistant("¡Hola! Soy el Chef Marianito."),
            ChatMessage::user("Me interesa la panadería"),
        ];

        let rendered = render_history(&history);

        assert_eq!(
            rendered,
            "Usuario: Hola\nAsistente: ¡Hola! Soy el Chef Marianito.\nUsuario: Me interesa la panadería"
        );
    }

    #[test]
    fn test_render_history_empty_placeholder() {
        assert_eq!(render_history(&[]), "(sin mensajes previos)");
    }

    #[test]
    fn test_render_prompt_section_order() {
        let history = vec![ChatMessage::user("Hola")];
        let prompt = render_prompt(&history, NO_CONTEXT_SENTINEL, "¿Qué cursos hay?");

        let persona_at = prompt.find("Chef Marianito").unwrap();
        let history_at = prompt.find("=== CONVERSACIÓN PREVIA ===").unwrap();
        let context_at = prompt.find("=== CONTEXTO DEL CATÁLOGO ===").unwrap();
        let query_at = prompt.find("=== CONSULTA ACTUAL ===").unwrap();

        assert!(persona_at < history_at);
        assert!(history_at < context_at);
        assert!(context_at < query_at);
        assert!(prompt.ends_with("Usuario: ¿Qué cursos hay?\nAsistente:"));
    }

    #[test]
    fn test_render_prompt_is_deterministic() {
        let history = vec![
            ChatMessage::user("Hola, soy Ana"),
            ChatMessage::assistant("¡Hola Ana!"),
        ];
        let context = format_context(&[course("Cocina", "Detalle", 0.6)]);

        let a = render_prompt(&history, &context, "¿Horarios?");
        let b = render_prompt(&history, &context, "¿Horarios?");

        assert_eq!(a, b);
    }

    #[test]
    fn test_persona_carries_all_disclosure_rules() {
        // The staging rules live in the persona text, so their presence in
        // every rendered prompt is the contract under test.
        assert!(SYSTEM_PERSONA.contains("su nombre"));
        assert!(SYSTEM_PERSONA.contains("correo electrónico"));
        assert!(SYSTEM_PERSONA.contains("no menciones precios"));
        assert!(SYSTEM_PERSONA.contains("horarios, duración y precio"));
        assert!(SYSTEM_PERSONA.contains("no inventes"));
        assert!(SYSTEM_PERSONA.contains("Instituto Superior Mariano Moreno"));
    }

    // Scenario fixtures for the disclosure stages. The model re-derives the
    // stage from the rendered conversation, so each fixture asserts that the
    // prompt presents the evidence for exactly that stage.

    #[test]
    fn test_scenario_unidentified_visitor() {
        let prompt = render_prompt(&[], NO_CONTEXT_SENTINEL, "Hola, ¿qué cursos tienen?");

        assert!(prompt.contains("(sin mensajes previos)"));
        assert!(prompt.contains("preguntale su nombre"));
        assert!(!prompt.contains("Usuario: Hola, soy"));
    }

    #[test]
    fn test_scenario_identified_interested_visitor() {
        let history = vec![
            ChatMessage::user("Hola, soy Ana y me interesa la pastelería"),
            ChatMessage::assistant("¡Hola Ana! La pastelería es un mundo maravilloso."),
        ];
        let context = format_context(&[course("Pastelería", "Duración: 6 meses", 0.8)]);
        let prompt = render_prompt(&history, &context, "Contame más");

        assert!(prompt.contains("Usuario: Hola, soy Ana y me interesa la pastelería"));
        assert!(prompt.contains("pedile un correo electrónico"));
    }

    #[test]
    fn test_scenario_qualified_visitor_sees_pricing_rule_and_context() {
        let history = vec![
            ChatMessage::user("Soy Ana, me interesa la pastelería"),
            ChatMessage::assistant("¡Hola Ana! ¿Me dejás un correo?"),
            ChatMessage::user("Claro: ana@example.com"),
        ];
        let context = format_context(&[course(
            "Pastelería Profesional",
            "Duración: 6 meses. Precio: $120000. Turnos mañana y noche.",
            0.85,
        )]);
        let prompt = render_prompt(&history, &context, "¿Cuánto sale?");

        assert!(prompt.contains("ana@example.com"));
        assert!(prompt.contains("Precio: $120000"));
        assert!(prompt.contains("podés compartir horarios, duración y precio"));
    }

    #[test]
    fn test_scenario_no_context_prompt_carries_sentinel_and_honesty_rule() {
        let prompt = render_prompt(&[], NO_CONTEXT_SENTINEL, "¿Tienen cursos de sushi?");

        assert!(prompt.contains(NO_CONTEXT_SENTINEL));
        assert!(prompt.contains("no inventes cursos, precios ni fechas"));
    }
}
