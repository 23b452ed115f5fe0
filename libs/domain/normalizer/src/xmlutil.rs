// [libs/domain/normalizer/src/xmlutil.rs]
//! Emisión mínima de XML plano. El XML intermedio de Lector Vision es
//! un árbol de profundidad uno sin atributos ni namespaces, así que la
//! emisión es un constructor de texto con escapado estricto.

/// Escapa un valor para usarlo como texto o atributo XML.
pub fn escape_xml(raw_text: &str) -> String {
    let mut escaped = String::with_capacity(raw_text.len());
    for character in raw_text.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Constructor de documentos planos `<root><TAG>texto</TAG>...</root>`.
pub struct FlatXmlBuilder {
    buffer: String,
    root_tag: &'static str,
}

impl FlatXmlBuilder {
    pub fn new(root_tag: &'static str) -> Self {
        Self {
            buffer: format!("<{}>", root_tag),
            root_tag,
        }
    }

    /// Añade un elemento hoja. El texto vacío produce `<TAG></TAG>`,
    /// que el parser de vuelta interpreta como campo ausente.
    pub fn leaf(&mut self, tag: &str, text: &str) -> &mut Self {
        self.buffer.push('<');
        self.buffer.push_str(tag);
        self.buffer.push('>');
        self.buffer.push_str(&escape_xml(text));
        self.buffer.push_str("</");
        self.buffer.push_str(tag);
        self.buffer.push('>');
        self
    }

    /// Variante condicional: omite el elemento cuando no hay valor.
    pub fn leaf_opt(&mut self, tag: &str, text: Option<&str>) -> &mut Self {
        if let Some(value) = text {
            self.leaf(tag, value);
        }
        self
    }

    pub fn finish(mut self) -> String {
        self.buffer.push_str("</");
        self.buffer.push_str(self.root_tag);
        self.buffer.push('>');
        self.buffer
    }
}
