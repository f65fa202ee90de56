/// Build the generation prompt for one message.
///
/// The wording asks for a body fragment only (no `<html>`/`<head>`/`<body>`),
/// with simple inline styles and no content beyond the original message.
pub fn build(raw: &str, subject: &str) -> String {
    format!(
        r#"Tâche : Convertis le message texte brut suivant en un corps d'email HTML bien structuré, professionnel, facile à lire et mis en forme avec des styles inline.
Contexte : L'objet de l'email est "{subject}".
Instructions :
1. Structure le contenu avec des balises sémantiques : paragraphes `<p>`, titres `<h2>` ou `<h3>`, listes `<ul><li>` ou `<ol><li>`. Utilise `<code>` pour les identifiants techniques.
2. Présente les données tabulaires avec `<table>`, `<thead>`, `<tbody>`, `<tr>`, `<th>`, `<td>`. Applique `style="border-collapse: collapse; border: 1px solid #cccccc;"` au tableau et `style="border: 1px solid #cccccc; padding: 5px 8px;"` aux cellules.
3. Utilise `<strong>` pour les informations importantes et les en-têtes de section.
4. N'utilise `<br>` que si c'est strictement nécessaire ; préfère des éléments de bloc distincts.
5. Garde des styles inline simples et sobres : la clarté avant tout, sans couleurs excessives ni mise en page complexe.
6. Préserve intégralement le sens et les informations du message. N'ajoute aucune information absente du message.
7. Génère UNIQUEMENT le fragment destiné à la balise `<body>`, sans `<html>`, `<head>`, `<body>` ni `<!DOCTYPE>`.
8. Si le message est très simple (une seule phrase), enveloppe-le simplement dans `<p>`.
9. Le HTML doit être valide et les attributs `style` correctement formatés.

Message brut :
---
{raw}
---

Fragment HTML pour le corps de l'email :
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeds_subject_and_message() {
        let prompt = build("Ligne 1\nLigne 2", "Rapport mensuel");
        assert!(prompt.contains("\"Rapport mensuel\""));
        assert!(prompt.contains("---\nLigne 1\nLigne 2\n---"));
    }
}
