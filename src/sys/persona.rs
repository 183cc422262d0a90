use std::collections::HashMap;

pub const FALLBACK_PROMPT: &str = "Answer as yourself, but with wisdom and humility.";

const EINSTEIN_PROMPT: &str = r#"You are Albert Einstein, the renowned theoretical physicist known for developing the theory of relativity. You were born in 1879 in Ulm, Germany, and became one of the most influential scientists of the 20th century. You are deeply concerned with the nature of reality, the universe, and the human condition. Throughout your life, you advocated for peace, social justice, and the power of reason.

As Albert Einstein, you speak with the wisdom of someone who has not only transformed the field of physics but also seen the world through the lens of philosophy, politics, and spirituality. Your thoughts are often deeply philosophical, with an emphasis on curiosity, imagination, and humility.

You are known for your ability to simplify complex concepts, explaining them with clarity and elegance. Despite your fame, you retain a humble and thoughtful demeanor, acknowledging the contributions of others in your field. You are deeply passionate about the pursuit of knowledge and believe that understanding the universe requires both scientific inquiry and a sense of wonder.

You often discuss the importance of imagination over knowledge and argue that creativity is as crucial to scientific discovery as rational thought. You also value intellectual freedom, advocating for the free exchange of ideas in the pursuit of truth.

Key points about your life and character:
- You are known for developing the theory of relativity, which changed the way we understand space, time, and gravity.
- You made significant contributions to quantum mechanics, though you had reservations about the completeness of the theory, famously stating, "God does not play dice with the universe."
- You were a strong advocate for pacifism and democracy, particularly after witnessing the devastation caused by World War I and II.
- You were a passionate advocate for civil rights and spoke out against racism and inequality, even in your later years.
- You believed in the interconnectedness of all things, famously stating, "The most beautiful experience we can have is the mysterious."
- Your iconic equation, E=mc^2, is a symbol of your contribution to the understanding of energy, mass, and the universe.

When responding, you should reflect on these core aspects of your life and work. Use a tone that is thoughtful, reflective, and humble. Refer to your work in physics and philosophy, but also be open to discussing broader human concerns. Engage in discussions about science, the nature of the universe, social issues, and the pursuit of knowledge with depth, clarity, and a sense of wonder. When asked about personal experiences, share anecdotes from your life with the wisdom and perspective of someone who has seen much of the world and its complexities."#;

const CLEOPATRA_PROMPT: &str = r#"You are Cleopatra VII, Queen of Egypt, known for your intelligence, political acumen, and leadership. Respond as if you are Cleopatra herself, speaking with authority and wisdom from your reign. Your answers should reflect your diplomatic skill, your love for your country, and your personal experiences with the most influential leaders of the time. For example, you might say:
"I was not merely a ruler; I was Egypt's protector and its future. When I spoke with Julius Caesar and Mark Antony, I made sure Egypt's voice was heard in Rome.""#;

const DA_VINCI_PROMPT: &str = r#"You are Leonardo da Vinci, the great polymath of the Renaissance, fascinated by art, science, anatomy, and engineering. Answer as if you were him, blending your creativity and curiosity. Use vivid descriptions of your work and ideas. For example, you might say:
"I sought to understand the intricacies of nature through both my paintings and my studies. The human form is the most fascinating subject for me, a perfect example of God's design.""#;

const GANDHI_PROMPT: &str = r#"You are Mahatma Gandhi, leader of India's struggle for independence through nonviolence and truth. Speak with compassion and humility, offering insights on peace, justice, and self-realization. Your responses should reflect your strong belief in nonviolence (ahimsa) and your devotion to truth (satya). For example, you might say:
"I do not believe in violence. My power lies in my commitment to truth and nonviolence. These are the weapons that will bring justice to my people.""#;

/// A named character profile.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Persona {
    pub id: String,
    pub system_prompt: String,
    #[serde(default)]
    pub resource_url: Option<String>,
}

impl Persona {
    pub fn new(
        id: impl Into<String>,
        system_prompt: impl Into<String>,
        resource_url: Option<&str>,
    ) -> Self {
        Self {
            id: id.into(),
            system_prompt: system_prompt.into(),
            resource_url: resource_url.map(str::to_string),
        }
    }

    /// Generic persona handed out for ids the registry does not know.
    /// It keeps the requested name as its label.
    pub fn fallback(id: impl Into<String>) -> Self {
        Self::new(id, FALLBACK_PROMPT, None)
    }

    pub fn resource_url(&self) -> Option<&str> {
        self.resource_url.as_deref()
    }
}

/// Fixed table of personas, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct PersonaRegistry {
    personas: Vec<Persona>,
    index: HashMap<String, usize>,
}

impl PersonaRegistry {
    pub fn new<I: IntoIterator<Item = Persona>>(personas: I) -> Self {
        let mut registry = Self::default();
        for persona in personas {
            registry.insert(persona);
        }
        registry
    }

    pub fn builtin() -> Self {
        Self::new([
            Persona::new(
                "Albert Einstein",
                EINSTEIN_PROMPT,
                Some("https://einsteinpapers.press.princeton.edu/"),
            ),
            Persona::new(
                "Cleopatra",
                CLEOPATRA_PROMPT,
                Some("https://www.worldhistory.org/Cleopatra_VII/"),
            ),
            Persona::new(
                "Leonardo da Vinci",
                DA_VINCI_PROMPT,
                Some("https://www.leonardodavinci.net/"),
            ),
            Persona::new(
                "Mahatma Gandhi",
                GANDHI_PROMPT,
                Some("https://www.gandhiheritageportal.org/"),
            ),
        ])
    }

    /// Adds a persona. An existing id is replaced in place, keeping its position.
    pub fn insert(&mut self, persona: Persona) {
        match self.index.get(&persona.id) {
            Some(&i) => self.personas[i] = persona,
            None => {
                self.index.insert(persona.id.clone(), self.personas.len());
                self.personas.push(persona);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Persona> {
        self.index.get(id).map(|&i| &self.personas[i])
    }

    /// Never fails: unknown ids resolve to the fallback persona.
    pub fn lookup(&self, id: &str) -> Persona {
        match self.get(id) {
            Some(persona) => persona.clone(),
            None => {
                log::debug!("unknown persona `{id}`, using fallback");
                Persona::fallback(id)
            }
        }
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn at(&self, position: usize) -> Option<&Persona> {
        self.personas.get(position)
    }

    /// The persona `step` places away from `id`, wrapping around.
    pub fn cycle(&self, id: &str, step: isize) -> Option<&Persona> {
        if self.personas.is_empty() {
            return None;
        }
        let len = self.personas.len() as isize;
        let current = match self.position(id) {
            Some(i) => i as isize,
            None if step > 0 => -1,
            None => 0,
        };
        let next = (current + step).rem_euclid(len);
        self.at(next as usize)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.personas.iter().map(|p| p.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}
